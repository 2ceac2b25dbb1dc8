use super::*;

mod chart;
mod phrase;

#[test]
fn budget_reports_cancel_before_timeout() {
    let cancel = CancelToken::new();
    let budget = Budget::start(&cancel, 0);
    assert_eq!(budget.check(), Ok(()));
    cancel.cancel();
    assert_eq!(budget.check(), Err(DecodeError::Cancelled));
}

#[test]
fn budget_times_out() {
    let cancel = CancelToken::new();
    let budget = Budget::start(&cancel, 1);
    std::thread::sleep(std::time::Duration::from_millis(5));
    assert_eq!(budget.check(), Err(DecodeError::Timeout(1)));
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let a = CancelToken::new();
    let b = a.clone();
    b.cancel();
    assert!(a.is_cancelled());
}
