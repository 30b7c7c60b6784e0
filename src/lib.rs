// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # typeforge
//!
//! Runtime type synthesis. `typeforge` builds new, strongly-shaped types while a program runs:
//! callers describe a type declaratively (fields, properties, methods, constructors, capability
//! implementations, metadata tags), hand the description to a [`synthesis::Synthesizer`] and get
//! back a live type whose instances can be created, read, written and invoked.
//!
//! On top of the engine sit two consumers:
//!
//! - **Proxies** ([`proxy`]) implement a capability by forwarding every member to a wrapped
//!   foreign object, wrap nested foreign results recursively and release the wrapped resource
//!   exactly once through an idempotent `Dispose` with a finalizer fallback.
//! - **Schema inference** ([`schema`]) derives types from tables, data readers, JSON and XML
//!   documents and pivoted key/row/value records, so untyped data can be consumed through
//!   synthesized objects.
//!
//! ## Quick Start
//!
//! ```rust
//! use typeforge::prelude::*;
//!
//! let synthesizer = Synthesizer::with_default_host();
//!
//! let mut descriptor = TypeDescriptor::new("Person");
//! descriptor
//!     .add_member(PropertyMember::new("Name", TypeSig::String))
//!     .add_member(PropertyMember::new("Age", TypeSig::I4));
//!
//! let person = synthesizer.compile(&mut descriptor)?;
//! let ada = person.create_instance(&[])?;
//! ada.set("Name", "Ada")?;
//! ada.set("Age", 36)?;
//!
//! assert_eq!(ada.get("Name")?, Value::from("Ada"));
//! assert_eq!(ada.get("Age")?, Value::I32(36));
//! # Ok::<(), typeforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`typesystem`] - declared types ([`typesystem::TypeSig`]), runtime values
//!   ([`typesystem::Value`]), capabilities and the dynamic object protocol
//! - [`descriptor`] - the member and type descriptors callers build
//! - [`codegen`] - accessor, forwarding and disposal body strategies
//! - [`host`] - the code host abstraction and its default in-process implementation
//! - [`runtime`] - compiled types, member handles and instances
//! - [`synthesis`] - the Define, Finalize and Bind phases
//! - [`proxy`] - forwarding proxies over foreign objects
//! - [`schema`] - tabular, document and pivot inference
//! - [`config`] - naming and nullability options
//!
//! ## Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events (synthesis phases, wrapper type
//! creation, disposal, duplicate pivot cells) and never installs a subscriber.
//!
//! ## Thread Safety
//!
//! Compiled types, instances, capabilities and synthesizers are `Send + Sync`. A code host
//! serializes type definition internally, so one synthesizer can be shared across threads.

#[macro_use]
pub(crate) mod error;

pub mod codegen;
pub mod config;
pub mod descriptor;
pub mod host;
pub mod prelude;
pub mod proxy;
pub mod runtime;
pub mod schema;
pub mod synthesis;
pub mod token;
pub mod typesystem;

/// `typeforge` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`crate::Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `typeforge` Error type
///
/// The main error type covering synthesis, runtime and input failures. See
/// [`crate::Error`] for the variants.
pub use error::Error;

/// Synthesis options
pub use config::{NullabilityPolicy, SynthesisConfig};

/// The synthesis entry point
pub use synthesis::Synthesizer;

/// Identity of synthesized types and members
pub use token::Token;
