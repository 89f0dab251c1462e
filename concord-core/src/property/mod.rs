//! Observable Properties
//!
//! A [`PropertyBag`] is a named set of JSON values that raises
//! [`PropertyChanged`](crate::notify::PropertyChanged) whenever a value
//! actually changes. Bags are built with an ordered list of initializers so
//! every property has its default before anyone can observe the bag.
//!
//! # Example
//!
//! ```rust
//! use concord_core::dispatch::SyncOperation;
//! use concord_core::property::{PropertyBag, PropertyKey};
//!
//! const TITLE: PropertyKey<String> = PropertyKey::new("Title");
//!
//! let bag = PropertyBag::builder(SyncOperation::inline())
//!     .with_default(TITLE, || "untitled".to_string())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(bag.get_key(&TITLE).unwrap().as_deref(), Some("untitled"));
//! assert!(bag.set_key(&TITLE, &"draft".to_string()).unwrap());
//! ```

mod bag;

pub use bag::{PropertyBag, PropertyBagBuilder, PropertyKey};
