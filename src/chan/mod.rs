//! Channels the matchers can probe.
//!
//! This module provides a blocking, directional channel carrying
//! [`Value`](crate::value::Value)s:
//!
//! - [`Chan`] - constructors for buffered, unbuffered and nil channels
//! - [`ChanHandle`] - a (possibly direction-restricted) handle
//! - [`ElemType`] / [`Direction`] - element typing and direction
//!
//! Channels are owned by the caller. Matchers only borrow handles for the
//! duration of one evaluation and never close them.
//!
//! # Example
//!
//! ```rust
//! use testkit_poll::chan::Chan;
//! use testkit_poll::value::{Kind, Value};
//!
//! let c = Chan::buffered(Kind::Int, 1);
//! c.try_send(1).unwrap();
//! c.close().unwrap();
//!
//! // Closing keeps buffered values
//! assert!(c.is_closed());
//! assert_eq!(c.recv().unwrap(), Value::from(1));
//! ```

mod channel;

pub use channel::{Chan, ChanError, ChanHandle, Direction, ElemType, RecvError, SendError};
