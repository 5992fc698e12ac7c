pub mod password;
pub mod session;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::models::User;
use crate::db::users::{self, NewUser};
use crate::db::StoreResult;

/// Create the account and its first session together. Either both rows
/// land or neither does.
pub fn create_account(
    conn: &Connection,
    new: &NewUser,
    session_hours: u64,
) -> StoreResult<(User, String)> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let user = users::create_user(&tx, new)?;
    let token = session::create_session(&tx, user.id, session_hours)?;
    tx.commit()?;
    Ok((user, token))
}
