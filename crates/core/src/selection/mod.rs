#![allow(missing_docs)]

//! Character selection state, its action API and derived views.

pub mod derived;
mod state;

pub use state::{SelectionState, SelectionStore};
