use netreq_core::NetError;
use netreq_retry::{classify, is_idempotent_method, RetryDecision, RetryPolicy};
use std::time::Duration;

fn run_to_completion(policy: &RetryPolicy, idempotent: bool, fails_before_success: usize) {
    let mut attempt = 0usize;
    loop {
        println!("  call (attempt {})", attempt + 1);
        let outcome: Result<(), NetError> = if attempt < fails_before_success {
            Err(NetError::ServerError {
                code: 503,
                message: None,
            })
        } else {
            Ok(())
        };

        let error = match outcome {
            Ok(()) => {
                println!("  [SUCCESS] after {} attempt(s)", attempt + 1);
                return;
            }
            Err(error) => error,
        };

        match classify(policy, &error, idempotent, attempt) {
            RetryDecision::Retry(delay) => {
                println!("  [RETRY] after {delay:?}");
                attempt += 1;
            }
            RetryDecision::GiveUp => {
                println!("  [GIVE UP] {error}");
                return;
            }
            RetryDecision::Exhausted => {
                println!("  [EXHAUSTED] last error: {error}");
                return;
            }
        }
    }
}

fn main() {
    println!("netreq-retry Example");
    println!("=====================\n");

    println!("Example 1: fixed backoff, succeeds on the third attempt");
    run_to_completion(
        &RetryPolicy::Fixed {
            delay: Duration::from_millis(100),
            max_attempts: 5,
        },
        true,
        2,
    );
    println!();

    println!("Example 2: exponential backoff, succeeds on the fourth attempt");
    run_to_completion(
        &RetryPolicy::Exponential {
            base: Duration::from_millis(50),
            max: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
        },
        true,
        3,
    );
    println!();

    println!("Example 3: non-idempotent request gives up immediately on any error");
    run_to_completion(
        &RetryPolicy::Fixed {
            delay: Duration::from_millis(50),
            max_attempts: 5,
        },
        is_idempotent_method("POST"),
        5,
    );
    println!();

    println!("Example 4: retries exhausted before success");
    run_to_completion(
        &RetryPolicy::Fixed {
            delay: Duration::from_millis(50),
            max_attempts: 3,
        },
        true,
        10,
    );
}
