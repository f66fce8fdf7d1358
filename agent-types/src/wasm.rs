//! Send/Sync compatibility shims.
//!
//! Native targets require `Send + Sync` on futures and trait objects so they
//! can cross thread boundaries inside the Tokio runtime. A `wasm32` target
//! running on a single-threaded executor has no such requirement, and the
//! bounds would simply fail to be satisfiable for `!Send` browser types
//! (e.g. `JsValue`). These aliases collapse to the native bounds everywhere
//! except `wasm32`, where they collapse to nothing.

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use std::future::Future;
    use std::pin::Pin;

    /// `Send` on native targets, a no-op bound on `wasm32`.
    pub trait WasmCompatSend: Send {}
    impl<T: Send> WasmCompatSend for T {}

    /// `Sync` on native targets, a no-op bound on `wasm32`.
    pub trait WasmCompatSync: Sync {}
    impl<T: Sync> WasmCompatSync for T {}

    /// A boxed future that is `Send` on native targets.
    pub type WasmBoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use std::future::Future;
    use std::pin::Pin;

    /// No-op on `wasm32` — the single-threaded executor never moves futures
    /// across threads.
    pub trait WasmCompatSend {}
    impl<T> WasmCompatSend for T {}

    /// No-op on `wasm32`.
    pub trait WasmCompatSync {}
    impl<T> WasmCompatSync for T {}

    /// A boxed future without a `Send` bound, for `wasm32`.
    pub type WasmBoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
}

pub use imp::{WasmBoxedFuture, WasmCompatSend, WasmCompatSync};
