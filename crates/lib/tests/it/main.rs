/*! Integration tests for ctxsync.

Every area of the sync engine has its own module here, all sharing the
store and context builders in [`helpers`]. Tests run against a
[`FixedClock`](ctxsync::FixedClock) so timestamp ordering is deterministic:
each node created later is strictly newer than the ones before it.
*/

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ctxsync=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

mod compare;
mod container_sync;
mod facade;
mod filter;
mod helpers;
mod merger;
mod ops;
