//! Input interception: `beforeinput` intents and input method
//! composition turned into transactions.

pub mod composition;
pub mod intent;
pub mod words;

pub use composition::CompositionState;
pub use intent::{InputIntent, intent_transaction};
pub use words::{CharClass, classify, word_end, word_start};
