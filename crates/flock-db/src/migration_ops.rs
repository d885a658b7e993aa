use redb_bincode::ReadableTable as _;
use tracing::{debug, info};

use crate::{
    Database, DbResult, DbVersionTooHighSnafu, LOG_TARGET, WriteTransactionCtx, account_self,
    db_version, followers, unfollowers, unfollowers_seq,
};

impl Database {
    pub(crate) fn init_tables_tx(tx: &WriteTransactionCtx) -> DbResult<()> {
        tx.open_table(&db_version::TABLE)?;
        tx.open_table(&account_self::TABLE)?;

        tx.open_table(&followers::TABLE)?;
        tx.open_table(&unfollowers::TABLE)?;
        tx.open_table(&unfollowers_seq::TABLE)?;
        Ok(())
    }

    pub(crate) fn handle_db_ver_migrations(dbtx: &WriteTransactionCtx) -> DbResult<()> {
        const DB_VER: u64 = 0;

        let mut table_db_ver = dbtx.open_table(&db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.first()?.map(|g| g.1.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert(&(), &DB_VER)?;

            return Ok(());
        };

        if DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: DB_VER,
            }
            .fail();
        }

        // No migrations yet, the first schema is the current one.
        debug!(target: LOG_TARGET, db_ver = cur_db_ver, "Db version");

        Ok(())
    }
}
