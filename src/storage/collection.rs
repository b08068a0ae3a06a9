use crate::error::Result;
use crate::utils::{decode_key, deserialize, encode_key, serialize};
use sled::{Batch, Db, Tree};
use std::marker::PhantomData;

/// Whole-collection durable store for blocks, pending transactions and peers.
///
/// Every mutating call is flushed to disk before it returns.
pub trait Collection<T>: Send + Sync {
    fn read_all(&self) -> Result<Vec<T>>;
    fn write_all(&self, items: &[T]) -> Result<()>;
    fn append_one(&self, item: &T) -> Result<()>;
}

/// ( K -> big-endian position, V -> bincode item )
pub struct SledCollection<T> {
    tree: Tree,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SledCollection<T> {
    pub fn open(db: &Db, name: &str) -> Result<SledCollection<T>> {
        let tree = db.open_tree(name)?;
        Ok(SledCollection {
            tree,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn next_position(&self) -> Result<u64> {
        match self.tree.last()? {
            Some((key, _)) => Ok(decode_key(&key)? + 1),
            None => Ok(0),
        }
    }
}

impl<T> Collection<T> for SledCollection<T>
where
    T: bincode::Encode + bincode::Decode<()>,
{
    fn read_all(&self) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(self.tree.len());
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            items.push(deserialize::<T>(value.as_ref())?);
        }
        Ok(items)
    }

    fn write_all(&self, items: &[T]) -> Result<()> {
        // One batch, so readers never observe a half-rewritten collection
        let mut batch = Batch::default();
        for key in self.tree.iter().keys() {
            batch.remove(key?);
        }
        for (position, item) in items.iter().enumerate() {
            batch.insert(encode_key(position as u64).to_vec(), serialize(item)?);
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush()?;
        Ok(())
    }

    fn append_one(&self, item: &T) -> Result<()> {
        let position = self.next_position()?;
        self.tree.insert(encode_key(position), serialize(item)?)?;
        self.tree.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    fn temp_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let db = temp_db();
        let store: SledCollection<Transaction> = SledCollection::open(&db, "mempool").unwrap();
        for amount in [5, 1, 3] {
            store
                .append_one(&Transaction::new_transfer(1, 2, amount))
                .unwrap();
        }
        let amounts: Vec<u64> = store
            .read_all()
            .unwrap()
            .iter()
            .map(|tx| tx.get_amount())
            .collect();
        assert_eq!(amounts, vec![5, 1, 3]);
    }

    #[test]
    fn test_write_all_replaces_contents() {
        let db = temp_db();
        let store: SledCollection<String> = SledCollection::open(&db, "peers").unwrap();
        store
            .write_all(&["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        store.write_all(&["z".to_string()]).unwrap();
        assert_eq!(store.read_all().unwrap(), vec!["z".to_string()]);

        store.write_all(&[]).unwrap();
        assert!(store.is_empty());
        store.append_one(&"after".to_string()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_round_trip_through_write_all() {
        let db = temp_db();
        let store: SledCollection<String> = SledCollection::open(&db, "peers").unwrap();
        store.append_one(&"127.0.0.1:2001".to_string()).unwrap();
        store.append_one(&"127.0.0.1:2002".to_string()).unwrap();

        let before = store.read_all().unwrap();
        store.write_all(&before).unwrap();
        assert_eq!(store.read_all().unwrap(), before);
    }
}
