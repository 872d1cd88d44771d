//! Cookie state management.
//!
//! This module provides:
//! - [`CookieAgent`]: attaches matching cookies to requests and stores
//!   cookies set by responses
//! - [`CookieSpec`] policies (`best-match`, `compatibility`, `rfc2965`,
//!   `ignoreCookies`) looked up by name in a [`CookieSpecRegistry`]
//! - [`CookieStore`] and the in-memory [`BasicCookieStore`]
//! - Netscape `cookies.txt` import

mod agent;
mod error;
mod model;
pub mod netscape;
mod parse;
pub mod spec;
mod store;

pub use agent::CookieAgent;
pub use error::CookieError;
pub use model::{Cookie, CookieKey, CookieOrigin};
pub use netscape::{ParseResult, load_cookies_into_store, parse_netscape_cookies};
pub use spec::{
    BestMatchSpec, BrowserCompatSpec, CookieSpec, CookieSpecRegistry, DEFAULT_COOKIE_POLICY,
    IgnoreSpec, Rfc2965Spec, SetCookieKind,
};
pub use store::{BasicCookieStore, CookieStore};
