//! HTTP wire protocol of the table service.
//!
//! [`GridClient`](crate::GridClient) implements
//! [`RemoteStore`](crate::remote::RemoteStore) over these endpoints:
//!
//! | call | method | path |
//! |---|---|---|
//! | scroll | `POST` | `{base}/scroll` |
//! | upsert | `POST` | `{base}/upsert` |
//! | delete | `POST` | `{base}/delete` |
//! | metadata | `GET` / `PUT` | `{base}/tables/{tableId}/metadata` |

mod execute;
mod wire;

pub use wire::*;
