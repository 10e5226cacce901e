use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use rvmaster_common::protocol::error::{Result as RvResult, RvError};

use crate::config::{self, MasterConfig};
use crate::endpoint::MasterEndpoint;
use crate::error::{CallError, ConfigError};
use crate::pool::{EndpointKey, PoolConfig, RpcHandle, TcpPool, TransportPool};
use crate::shutdown::ShutdownSignal;
use crate::validate::{EnvelopeValidator, ResponseValidator};

/// Path used for every master call.
const MASTER_PATH: &str = "/";

/// Serializes transport invocations when [`CallSerialization`](crate::CallSerialization)
/// is enabled. Shared by every client in the process.
static TRANSPORT_CALL_LOCK: Mutex<()> = Mutex::new(());

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// Method-specific data extracted from the envelope
    pub payload: Value,
    /// The raw envelope as received
    pub response: Value,
}

/// Client for the master.
///
/// Owns the configuration, a shared handle to the transport pool, the
/// response validator and the shutdown signal. All calls are blocking; see
/// [`spawn_call`](crate::spawn_call) for use from async code.
///
/// # Call Lifecycle
///
/// [`execute`](Self::execute) acquires one handle from the pool and returns it
/// exactly once when the call ends, whatever the outcome. Between acquire and
/// release:
///
/// 1. The call is attempted.
/// 2. If the master answered, the envelope is validated and the call ends,
///    with the payload or with [`CallError::InvalidResponse`]. Invalid
///    responses are never retried.
/// 3. If the attempt failed, the call ends with [`CallError::ShuttingDown`]
///    when the process or the pool is shutting down, with
///    [`CallError::Unavailable`] when the caller did not ask to wait, and with
///    [`CallError::Timeout`] when a non-zero retry timeout has elapsed.
///    Otherwise the thread sleeps for the backoff interval and tries again on
///    the same handle.
///
/// The retry timeout is measured from the start of the call and read once per
/// call; zero means wait forever.
pub struct MasterClient<P = TcpPool, V = EnvelopeValidator> {
    config: MasterConfig,
    retry_timeout_nanos: AtomicU64,
    serialize_calls: bool,
    pool: Arc<P>,
    validator: V,
    shutdown: ShutdownSignal,
}

impl MasterClient<TcpPool, EnvelopeValidator> {
    /// Creates a client with a fresh [`TcpPool`], the envelope validator and
    /// its own shutdown signal.
    pub fn new(config: MasterConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(TcpPool::new(PoolConfig::default())),
            EnvelopeValidator,
            ShutdownSignal::new(),
        )
    }
}

impl<P, V> MasterClient<P, V>
where
    P: TransportPool,
    V: ResponseValidator,
{
    /// Creates a client from explicit collaborators.
    pub fn with_parts(
        config: MasterConfig,
        pool: Arc<P>,
        validator: V,
        shutdown: ShutdownSignal,
    ) -> Self {
        let serialize_calls = config.serialization().is_enabled();
        let retry_timeout_nanos = AtomicU64::new(duration_to_nanos(config.retry_timeout()));

        Self {
            config,
            retry_timeout_nanos,
            serialize_calls,
            pool,
            validator,
            shutdown,
        }
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &MasterEndpoint {
        self.config.endpoint()
    }

    pub fn caller_id(&self) -> &str {
        self.config.caller_id()
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Current retry timeout. Zero means wait forever.
    pub fn retry_timeout(&self) -> Duration {
        Duration::from_nanos(self.retry_timeout_nanos.load(Ordering::SeqCst))
    }

    /// Replaces the retry timeout for calls that start from now on.
    pub fn set_retry_timeout(&self, timeout: Duration) {
        self.retry_timeout_nanos
            .store(duration_to_nanos(timeout), Ordering::SeqCst);
    }

    /// Replaces the retry timeout from seconds.
    ///
    /// Negative or non-finite values are rejected and the current timeout is
    /// kept.
    pub fn set_retry_timeout_secs(&self, seconds: f64) -> Result<(), ConfigError> {
        let timeout = config::retry_timeout_from_secs(seconds)?;
        self.set_retry_timeout(timeout);
        Ok(())
    }

    /// Whether the process or the pool is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down() || self.pool.is_shutting_down()
    }

    /// Calls `method` on the master with positional `request` arguments.
    ///
    /// With `wait_for_master` false a single failed attempt ends the call with
    /// [`CallError::Unavailable`]; no sleep happens. With `wait_for_master`
    /// true the call retries until it gets a response, the retry timeout
    /// elapses or shutdown is requested. While a retry timeout is set, each
    /// connect is capped to the time left before it.
    pub fn execute(
        &self,
        method: &str,
        request: Vec<Value>,
        wait_for_master: bool,
    ) -> Result<CallOutcome, CallError> {
        let start = Instant::now();
        let retry_timeout = self.retry_timeout();
        let endpoint = self.endpoint();

        let mut checkout = Checkout::new(&*self.pool, &endpoint.key(MASTER_PATH));
        let mut reported = false;
        let mut slept = false;

        loop {
            let budget = (wait_for_master && !retry_timeout.is_zero())
                .then(|| retry_timeout.saturating_sub(start.elapsed()));
            checkout.limit_connect(budget);

            let attempt = {
                let _serialized = self.serialize_guard();
                checkout.call(method, &request)
            };

            let err = match attempt {
                Ok(response) => {
                    let payload = self
                        .validator
                        .validate(method, &response)
                        .map_err(|reason| CallError::InvalidResponse {
                            method: method.to_string(),
                            reason,
                        })?;

                    if slept {
                        info!(endpoint = %endpoint, "Connected to master");
                    }
                    return Ok(CallOutcome { payload, response });
                }
                Err(err) => err,
            };

            debug!(method, endpoint = %endpoint, error = %err, "master call attempt failed");

            if self.is_shutting_down() {
                return Err(CallError::ShuttingDown);
            }

            if !wait_for_master {
                return Err(CallError::Unavailable {
                    method: method.to_string(),
                    endpoint: endpoint.to_string(),
                });
            }

            if !reported {
                error!(method, endpoint = %endpoint, "Failed to contact master, retrying");
                reported = true;
            }

            if !retry_timeout.is_zero() && start.elapsed() >= retry_timeout {
                error!(
                    method,
                    timeout_secs = retry_timeout.as_secs_f64(),
                    "Timed out trying to connect to the master"
                );
                return Err(CallError::Timeout {
                    method: method.to_string(),
                    after: retry_timeout,
                });
            }

            thread::sleep(self.config.backoff());
            slept = true;

            if self.is_shutting_down() {
                return Err(CallError::ShuttingDown);
            }
        }
    }

    fn serialize_guard(&self) -> Option<MutexGuard<'static, ()>> {
        self.serialize_calls
            .then(|| TRANSPORT_CALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A handle borrowed from the pool, returned on drop.
struct Checkout<'a, P: TransportPool> {
    pool: &'a P,
    handle: Option<P::Handle>,
}

impl<'a, P: TransportPool> Checkout<'a, P> {
    fn new(pool: &'a P, key: &EndpointKey) -> Self {
        let handle = pool.acquire(key);
        Self {
            pool,
            handle: Some(handle),
        }
    }

    fn call(&mut self, method: &str, params: &[Value]) -> RvResult<Value> {
        match self.handle.as_mut() {
            Some(handle) => handle.call(method, params),
            None => Err(RvError::Transport("handle already released".to_string())),
        }
    }

    fn limit_connect(&mut self, budget: Option<Duration>) {
        if let Some(handle) = self.handle.as_mut() {
            handle.limit_connect(budget);
        }
    }
}

impl<P: TransportPool> Drop for Checkout<'_, P> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.limit_connect(None);
            self.pool.release(handle);
        }
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallSerialization;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tracing_test::traced_test;

    /// Shared state behind a scripted pool and its handles.
    ///
    /// Each attempt pops the next scripted reply; `None` (or an empty script)
    /// is a transport failure.
    #[derive(Default)]
    struct Script {
        replies: Mutex<VecDeque<Option<Value>>>,
        attempts: AtomicUsize,
        acquired: AtomicUsize,
        released: AtomicUsize,
        pool_shutdown: AtomicBool,
        pool_shutdown_on_attempt: Option<usize>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        hold: Duration,
        budgets: Mutex<Vec<Option<Duration>>>,
    }

    impl Script {
        fn with_replies(replies: Vec<Option<Value>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn budgets(&self) -> Vec<Option<Duration>> {
            self.budgets.lock().unwrap().clone()
        }

        fn assert_released_once(&self) {
            assert_eq!(self.acquired.load(Ordering::SeqCst), 1, "acquired");
            assert_eq!(self.released.load(Ordering::SeqCst), 1, "released");
        }
    }

    struct ScriptedPool(Arc<Script>);

    struct ScriptedHandle(Arc<Script>);

    impl RpcHandle for ScriptedHandle {
        fn call(&mut self, _method: &str, _params: &[Value]) -> RvResult<Value> {
            let in_flight = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

            let attempt = self.0.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.0.pool_shutdown_on_attempt == Some(attempt) {
                self.0.pool_shutdown.store(true, Ordering::SeqCst);
            }
            if !self.0.hold.is_zero() {
                thread::sleep(self.0.hold);
            }

            let reply = self.0.replies.lock().unwrap().pop_front();
            self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
            match reply {
                Some(Some(reply)) => Ok(reply),
                _ => Err(RvError::Connection("connection refused".to_string())),
            }
        }

        fn limit_connect(&mut self, budget: Option<Duration>) {
            self.0.budgets.lock().unwrap().push(budget);
        }
    }

    impl TransportPool for ScriptedPool {
        type Handle = ScriptedHandle;

        fn acquire(&self, _key: &EndpointKey) -> ScriptedHandle {
            self.0.acquired.fetch_add(1, Ordering::SeqCst);
            ScriptedHandle(self.0.clone())
        }

        fn release(&self, _handle: ScriptedHandle) {
            self.0.released.fetch_add(1, Ordering::SeqCst);
        }

        fn is_shutting_down(&self) -> bool {
            self.0.pool_shutdown.load(Ordering::SeqCst)
        }
    }

    fn config() -> MasterConfig {
        MasterConfig::new(MasterEndpoint::parse("http://localhost:11311").unwrap())
    }

    fn client(script: &Arc<Script>, config: MasterConfig) -> MasterClient<ScriptedPool> {
        MasterClient::with_parts(
            config,
            Arc::new(ScriptedPool(script.clone())),
            EnvelopeValidator,
            ShutdownSignal::new(),
        )
    }

    fn ok(payload: Value) -> Option<Value> {
        Some(json!([1, "", payload]))
    }

    fn count(lines: &[&str], needle: &str) -> usize {
        lines.iter().filter(|line| line.contains(needle)).count()
    }

    #[test]
    fn test_first_attempt_succeeds() {
        let script = Script::with_replies(vec![ok(json!(4242))]);
        let client = client(&script, config());

        let outcome = client.execute("getPid", vec![json!("/test_node")], true).unwrap();

        assert_eq!(outcome.payload, json!(4242));
        assert_eq!(outcome.response, json!([1, "", 4242]));
        assert_eq!(script.attempts(), 1);
        script.assert_released_once();
    }

    #[traced_test]
    #[test]
    fn test_no_wait_fails_after_one_attempt_without_sleeping() {
        let script = Script::with_replies(vec![]);
        let client = client(&script, config());

        let start = Instant::now();
        let result = client.execute("getPid", vec![json!("/test_node")], false);

        assert!(matches!(result, Err(CallError::Unavailable { .. })));
        assert!(start.elapsed() < client.config().backoff());
        assert_eq!(script.attempts(), 1);
        script.assert_released_once();
        assert!(!logs_contain("Failed to contact master"));
    }

    #[traced_test]
    #[test]
    fn test_retries_until_master_answers() {
        let script = Script::with_replies(vec![None, None, None, ok(json!([]))]);
        let client = client(&script, config().with_backoff(Duration::from_millis(5)));

        let outcome = client
            .execute("getPublishedTopics", vec![json!("/test_node"), json!("")], true)
            .unwrap();

        assert_eq!(outcome.payload, json!([]));
        assert_eq!(script.attempts(), 4);
        script.assert_released_once();
        logs_assert(|lines: &[&str]| {
            match (count(lines, "Failed to contact master"), count(lines, "Connected to master")) {
                (1, 1) => Ok(()),
                (failed, connected) => Err(format!(
                    "expected one failure and one connected notice, got {} and {}",
                    failed, connected
                )),
            }
        });
    }

    #[traced_test]
    #[test]
    fn test_no_connected_notice_without_backoff() {
        let script = Script::with_replies(vec![ok(json!(1))]);
        let client = client(&script, config());

        client.execute("getPid", vec![], true).unwrap();
        assert!(!logs_contain("Connected to master"));
    }

    #[test]
    fn test_timeout_bounds() {
        let timeout = Duration::from_millis(200);
        let script = Script::with_replies(vec![]);
        let config = config().with_retry_timeout(timeout);
        let backoff = config.backoff();
        let client = client(&script, config);

        let start = Instant::now();
        let result = client.execute("getSystemState", vec![json!("/test_node")], true);
        let elapsed = start.elapsed();

        assert_eq!(
            result,
            Err(CallError::Timeout {
                method: "getSystemState".to_string(),
                after: timeout,
            })
        );
        assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
        assert!(elapsed < timeout + backoff, "returned late after {:?}", elapsed);
        assert!(script.attempts() > 1);
        script.assert_released_once();
    }

    #[test]
    fn test_invalid_envelope_not_retried() {
        let script = Script::with_replies(vec![Some(json!("garbage")), ok(json!(1))]);
        let client = client(&script, config());

        let result = client.execute("getPid", vec![], true);

        assert!(matches!(result, Err(CallError::InvalidResponse { .. })));
        assert_eq!(script.attempts(), 1);
        script.assert_released_once();
    }

    #[test]
    fn test_error_status_is_invalid_response() {
        let script = Script::with_replies(vec![Some(json!([-1, "bad caller id", 0]))]);
        let client = client(&script, config());

        match client.execute("getPid", vec![], true) {
            Err(CallError::InvalidResponse { method, reason }) => {
                assert_eq!(method, "getPid");
                assert!(reason.contains("bad caller id"));
            }
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
        script.assert_released_once();
    }

    #[test]
    fn test_pool_shutdown_mid_retry() {
        let script = Arc::new(Script {
            pool_shutdown_on_attempt: Some(3),
            ..Script::default()
        });
        let client = client(&script, config().with_backoff(Duration::from_millis(5)));

        let result = client.execute("getSystemState", vec![], true);

        assert_eq!(result, Err(CallError::ShuttingDown));
        assert_eq!(script.attempts(), 3);
        script.assert_released_once();
    }

    #[test]
    fn test_process_shutdown_ends_unbounded_wait() {
        let script = Script::with_replies(vec![]);
        let client = client(&script, config());
        assert!(client.retry_timeout().is_zero());

        let signal = client.shutdown_signal().clone();
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            signal.request_shutdown();
        });

        let result = client.execute("getSystemState", vec![], true);
        trigger.join().unwrap();

        assert_eq!(result, Err(CallError::ShuttingDown));
        assert!(script.attempts() > 1);
        script.assert_released_once();
    }

    #[test]
    fn test_shutdown_wins_over_unavailable() {
        let script = Script::with_replies(vec![]);
        let client = client(&script, config());
        client.shutdown_signal().request_shutdown();

        assert_eq!(client.execute("getPid", vec![], false), Err(CallError::ShuttingDown));
        script.assert_released_once();
    }

    #[test]
    fn test_shutdown_does_not_discard_a_response() {
        let script = Script::with_replies(vec![ok(json!(7))]);
        let client = client(&script, config());
        client.shutdown_signal().request_shutdown();

        assert_eq!(client.execute("getPid", vec![], false).unwrap().payload, json!(7));
    }

    #[test]
    fn test_negative_retry_timeout_rejected() {
        let script = Script::with_replies(vec![]);
        let client = client(&script, config());
        client.set_retry_timeout(Duration::from_secs(3));

        assert_eq!(
            client.set_retry_timeout_secs(-2.0),
            Err(ConfigError::InvalidRetryTimeout(-2.0))
        );
        assert_eq!(client.retry_timeout(), Duration::from_secs(3));

        client.set_retry_timeout_secs(0.25).unwrap();
        assert_eq!(client.retry_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_serialized_calls_never_overlap() {
        let script = Arc::new(Script {
            replies: Mutex::new((0..8).map(|i| ok(json!(i))).collect()),
            hold: Duration::from_millis(5),
            ..Script::default()
        });
        let client = Arc::new(client(
            &script,
            config().with_serialization(CallSerialization::Always),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                thread::spawn(move || client.execute("getPid", vec![], false))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(script.attempts(), 8);
        assert_eq!(script.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(script.acquired.load(Ordering::SeqCst), 8);
        assert_eq!(script.released.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_serialization_lock_released_during_backoff() {
        let backoff = Duration::from_millis(400);
        let waiting_script = Script::with_replies(vec![]);
        let waiting = Arc::new(client(
            &waiting_script,
            config()
                .with_serialization(CallSerialization::Always)
                .with_backoff(backoff),
        ));

        let caller = waiting.clone();
        let blocked = thread::spawn(move || caller.execute("getSystemState", vec![], true));
        while waiting_script.attempts() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let live_script = Script::with_replies(vec![ok(json!(4242))]);
        let live = client(
            &live_script,
            config().with_serialization(CallSerialization::Always),
        );
        let start = Instant::now();
        let outcome = live.execute("getPid", vec![], false).unwrap();

        assert_eq!(outcome.payload, json!(4242));
        assert!(start.elapsed() < backoff / 2, "waited {:?}", start.elapsed());
        live_script.assert_released_once();

        waiting.shutdown_signal().request_shutdown();
        assert_eq!(blocked.join().unwrap(), Err(CallError::ShuttingDown));
        waiting_script.assert_released_once();
    }

    #[test]
    fn test_connect_capped_to_remaining_retry_time() {
        let timeout = Duration::from_millis(150);
        let script = Script::with_replies(vec![]);
        let client = client(&script, config().with_retry_timeout(timeout));

        let result = client.execute("getSystemState", vec![], true);
        assert!(matches!(result, Err(CallError::Timeout { .. })));

        let budgets = script.budgets();
        let (last, per_attempt) = budgets.split_last().unwrap();
        assert_eq!(*last, None, "cap lifted before release");
        assert_eq!(per_attempt.len(), script.attempts());
        assert!(per_attempt[0].unwrap() <= timeout);
        for pair in per_attempt.windows(2) {
            assert!(pair[1].unwrap() < pair[0].unwrap());
        }
    }

    #[test]
    fn test_connect_uncapped_without_retry_timeout() {
        let forever = Script::with_replies(vec![None, ok(json!(1))]);
        client(&forever, config().with_backoff(Duration::from_millis(5)))
            .execute("getPid", vec![], true)
            .unwrap();

        let single = Script::with_replies(vec![]);
        let result = client(&single, config().with_retry_timeout(Duration::from_secs(1)))
            .execute("getPid", vec![], false);
        assert!(matches!(result, Err(CallError::Unavailable { .. })));

        assert!(forever.budgets().iter().all(Option::is_none));
        assert!(single.budgets().iter().all(Option::is_none));
    }
}
