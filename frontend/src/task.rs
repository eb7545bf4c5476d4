// frontend/src/task.rs
//
// Single-threaded task helpers. On wasm everything runs on the browser's
// microtask queue; natively callers must be inside a `tokio::task::LocalSet`.

use std::future::Future;
use std::time::Duration;

pub fn spawn_local<F>(fut: F)
where
    F: Future<Output = ()> + 'static,
{
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(fut);

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = tokio::task::spawn_local(fut);
    }
}

pub async fn sleep(duration: Duration) {
    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(duration).await;

    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;
}
