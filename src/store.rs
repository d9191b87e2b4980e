use bincode::config::{self, standard};
use parity_db::{BTreeIterator, ColId, Db, Options};
use parking_lot::Mutex;
use std::path::Path;

use crate::{
    orders::Order,
    repository::{OrderRepository, RepositoryError, RepositoryResult},
};

const ORDERS: ColId = 0;

/// A ParityDB-backed order repository, keyed by order id.
///
/// Values are bincode-encoded [`Order`]s. Every write is a single commit, and
/// read-modify-write sequences hold `write_lock` so they never interleave.
pub struct ParityDbOrderRepository {
    db: Db,
    write_lock: Mutex<()>,
}

impl ParityDbOrderRepository {
    /// Open (or create) a ParityDB at `path`, with a single column and B-tree index.
    pub fn open(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let mut opts = Options::with_columns(path.as_ref(), 1);
        // B-tree index so `list` can walk the column
        opts.columns[ORDERS as usize].btree_index = true;
        let db = Db::open_or_create(&opts)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    #[inline]
    fn decode(raw: &[u8]) -> RepositoryResult<Order> {
        let (order, _): (Order, usize) = bincode::decode_from_slice(raw, standard())?;
        Ok(order)
    }

    fn put(&self, id: &str, order: &Order) -> RepositoryResult<()> {
        let value = bincode::encode_to_vec(order, config::standard())?;
        self.db
            .commit(vec![(ORDERS, id.as_bytes().to_vec(), Some(value))])?;
        Ok(())
    }
}

impl OrderRepository for ParityDbOrderRepository {
    fn list(&self) -> RepositoryResult<Vec<Order>> {
        let mut it: BTreeIterator<'_> = self.db.iter(ORDERS)?;
        it.seek_to_first()?;
        let mut orders = Vec::new();
        while let Some((_key, raw)) = it.next()? {
            orders.push(Self::decode(&raw)?);
        }
        orders.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    fn get(&self, id: &str) -> RepositoryResult<Option<Order>> {
        self.db
            .get(ORDERS, id.as_bytes())?
            .map(|raw| Self::decode(&raw))
            .transpose()
    }

    fn create(&self, order: Order) -> RepositoryResult<Order> {
        let _guard = self.write_lock.lock();
        if self.db.get(ORDERS, order.id.as_bytes())?.is_some() {
            return Err(RepositoryError::DuplicateId(order.id));
        }
        self.put(&order.id, &order)?;
        Ok(order)
    }

    fn update(&self, id: &str, order: Order) -> RepositoryResult<Option<Order>> {
        let _guard = self.write_lock.lock();
        if self.db.get(ORDERS, id.as_bytes())?.is_none() {
            return Ok(None);
        }
        self.put(id, &order)?;
        Ok(Some(order))
    }

    fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let _guard = self.write_lock.lock();
        if self.db.get(ORDERS, id.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db
            .commit(vec![(ORDERS, id.as_bytes().to_vec(), None)])?;
        Ok(true)
    }
}
