//! Core types for frame representation.
//!
//! ## Architecture
//!
//! - [`StreamType`] names how a payload is interpreted and maps to the wire id
//! - [`Shape`] holds payload dimensions, with `cols == 0` meaning one-dimensional
//! - [`Frame`] is the unit exchanged per tick: header fields plus `f32` payload
//! - [`UpdateRate`] controls how often a client hands frames to its consumer
//!
//! ## Usage Example
//!
//! ```rust
//! use pointstream::types::{Frame, Shape, StreamType};
//!
//! let frame = Frame::from_payload(
//!     StreamType::Points3d,
//!     7,
//!     Shape::new(2, 3),
//!     vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
//! )?;
//!
//! assert_eq!(frame.dims(), vec![2, 3]);
//! assert_eq!(frame.max_val, 5.0);
//! # Ok::<(), pointstream::StreamError>(())
//! ```

mod frame;
mod shape;
mod stream_type;
mod update_rate;

pub use frame::{Frame, value_range};
pub use shape::Shape;
pub use stream_type::StreamType;
pub use update_rate::UpdateRate;
