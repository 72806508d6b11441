use rusqlite::Connection;

use crate::error::Result;

pub trait StorageTx {
    fn conn(&self) -> &Connection;
    fn commit(self) -> Result<()>;
}

pub trait Storage {
    type Tx: StorageTx;

    fn begin_tx(&self) -> Result<Self::Tx>;

    /// Runs `f` on a fresh connection without an explicit transaction.
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>;

    /// Runs `f` inside an immediate transaction.
    ///
    /// The transaction is committed only when `f` succeeds; on error the
    /// connection is dropped and SQLite rolls the work back.
    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.begin_tx()?;
        let out = f(tx.conn())?;
        tx.commit()?;
        Ok(out)
    }
}
