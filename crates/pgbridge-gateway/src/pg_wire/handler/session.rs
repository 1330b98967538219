//! Per-connection session state
//!
//! Owned by the connection task; nothing here is shared or locked.

use super::portal::Portal;
use super::utils::{transaction_command, TxCommand};
use crate::errors::sqlstate;
use crate::pg_wire::cancel::Registration;
use crate::pg_wire::protocol::TransactionStatus;
use pgbridge_common::{BridgeError, Identity, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A parsed statement; immutable once stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedStatement {
    pub query: String,
    /// Declared parameter OIDs, 0 meaning unspecified
    pub param_types: Vec<u32>,
}

pub(crate) struct Session {
    pub identity: Identity,
    pub registration: Registration,
    status: TransactionStatus,
    /// A BEGIN is open; Sync keeps a failed block failed
    explicit_tx: bool,
    /// Named and unnamed ("") prepared statements
    pub statements: HashMap<String, Arc<PreparedStatement>>,
    pub portals: HashMap<String, Portal>,
    /// Discard everything but Sync/Terminate after an extended-protocol error
    pub ignore_till_sync: bool,
}

impl Session {
    pub fn new(identity: Identity, registration: Registration) -> Self {
        Self {
            identity,
            registration,
            status: TransactionStatus::Idle,
            explicit_tx: false,
            statements: HashMap::new(),
            portals: HashMap::new(),
            ignore_till_sync: false,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn pid(&self) -> i32 {
        self.registration.pid()
    }

    /// Record a failed message
    pub fn fail(&mut self) {
        self.status = TransactionStatus::Failed;
        self.ignore_till_sync = true;
    }

    /// Handle Sync and return the status to report in ReadyForQuery
    pub fn sync(&mut self) -> TransactionStatus {
        if self.ignore_till_sync {
            self.portals.clear();
            self.statements.remove("");
            self.ignore_till_sync = false;
        }
        if self.status == TransactionStatus::Failed && !self.explicit_tx {
            self.status = TransactionStatus::Idle;
        }
        self.status
    }

    /// Simple Query starts over with no unnamed statement or portal
    pub fn clear_unnamed(&mut self) {
        self.statements.remove("");
        self.portals.remove("");
    }

    /// Refuse work inside a failed transaction block
    pub fn check_not_aborted(&self, query: &str) -> Result<()> {
        let ends_block = matches!(
            transaction_command(query),
            Some(TxCommand::Commit | TxCommand::Rollback)
        );
        if self.status == TransactionStatus::Failed && self.explicit_tx && !ends_block {
            return Err(BridgeError::statement(
                sqlstate::IN_FAILED_SQL_TRANSACTION,
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }
        Ok(())
    }

    /// Apply a transaction control statement and return its command tag
    pub fn apply(&mut self, command: TxCommand) -> &'static str {
        match command {
            TxCommand::Begin => {
                self.status = TransactionStatus::InTransaction;
                self.explicit_tx = true;
                "BEGIN"
            }
            TxCommand::Commit => {
                let failed = self.status == TransactionStatus::Failed;
                self.status = TransactionStatus::Idle;
                self.explicit_tx = false;
                // a failed block can only roll back
                if failed {
                    "ROLLBACK"
                } else {
                    "COMMIT"
                }
            }
            TxCommand::Rollback => {
                self.status = TransactionStatus::Idle;
                self.explicit_tx = false;
                "ROLLBACK"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pg_wire::cancel::CancelRegistry;
    use pgbridge_common::Credential;

    fn session() -> Session {
        let identity = Identity::anonymous(Credential::Anonymous { user: "u".into() }, "anonymous");
        Session::new(identity, CancelRegistry::new().register(1, 1))
    }

    #[test]
    fn test_error_outside_block_resets_on_sync() {
        let mut s = session();
        s.statements.insert(
            "".into(),
            Arc::new(PreparedStatement {
                query: "SELECT 1".into(),
                param_types: vec![],
            }),
        );
        s.fail();
        assert_eq!(s.status(), TransactionStatus::Failed);
        assert!(s.ignore_till_sync);

        assert_eq!(s.sync(), TransactionStatus::Idle);
        assert!(!s.ignore_till_sync);
        assert!(s.statements.is_empty());
    }

    #[test]
    fn test_failed_block_until_rollback() {
        let mut s = session();
        assert_eq!(s.apply(TxCommand::Begin), "BEGIN");
        assert_eq!(s.status(), TransactionStatus::InTransaction);

        s.fail();
        assert_eq!(s.sync(), TransactionStatus::Failed);

        let err = s.check_not_aborted("SELECT 1").unwrap_err();
        assert!(matches!(err, BridgeError::Statement { sqlstate: "25P02", .. }));
        assert!(s.check_not_aborted("ROLLBACK").is_ok());

        assert_eq!(s.apply(TxCommand::Commit), "ROLLBACK");
        assert_eq!(s.status(), TransactionStatus::Idle);
        assert!(s.check_not_aborted("SELECT 1").is_ok());
    }

    #[test]
    fn test_commit() {
        let mut s = session();
        s.apply(TxCommand::Begin);
        assert_eq!(s.apply(TxCommand::Commit), "COMMIT");
        assert_eq!(s.sync(), TransactionStatus::Idle);
    }
}
