mod error;
mod model;
mod state;

pub use error::{ErrorKind, ExitCode, KeeperError, KeeperResult};
pub use model::{
    Account, Bookmark, BookmarksPage, NewBookmark, Tag, UNKNOWN_ACCOUNT_ID, User,
};
pub use state::{Resource, UiState};
