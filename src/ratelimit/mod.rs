//! Quota accounting logic.

mod window;

pub use window::{
    LimitExceededMessage, WindowCounter, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
};
