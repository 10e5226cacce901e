//! Running blocking client calls from async code.

use std::sync::Arc;

use crate::error::CallError;
use crate::executor::MasterClient;
use crate::pool::TransportPool;
use crate::validate::ResponseValidator;

/// Runs `f` against `client` on tokio's blocking thread pool.
///
/// Calls that wait for the master sleep their thread between attempts, so
/// they must not run on an async worker. A panic inside `f` is resumed on the
/// awaiting task; a task cancelled by runtime shutdown yields
/// [`CallError::ShuttingDown`].
///
/// # Example
///
/// ```no_run
/// use rvmaster_client::{spawn_call, MasterClient, MasterConfig, MasterEndpoint};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let endpoint = MasterEndpoint::parse("http://localhost:11311")?;
/// let client = Arc::new(MasterClient::new(MasterConfig::new(endpoint)));
///
/// let nodes = spawn_call(client, |c| c.get_nodes()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn spawn_call<P, V, T, F>(client: Arc<MasterClient<P, V>>, f: F) -> Result<T, CallError>
where
    P: TransportPool + 'static,
    V: ResponseValidator + 'static,
    T: Send + 'static,
    F: FnOnce(&MasterClient<P, V>) -> Result<T, CallError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&client)).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(CallError::ShuttingDown),
    }
}
