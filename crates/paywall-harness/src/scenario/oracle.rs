//! Reusable oracle building blocks.

use paywall_app::LockStatus;
use paywall_proto::RequestId;

use crate::scenario::OracleFn;

/// Run every oracle; the first failure wins.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| oracles.into_iter().try_for_each(|oracle| oracle(world)))
}

/// Final lock status is `expected`.
pub fn status_is(expected: LockStatus) -> OracleFn {
    Box::new(move |world| {
        let actual = world.status();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected status {expected:?}, got {actual:?}"))
        }
    })
}

/// Page events were dispatched with exactly these names, in order.
pub fn event_names_are(expected: Vec<&'static str>) -> OracleFn {
    Box::new(move |world| {
        let actual = world.event_names();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected page events {expected:?}, got {actual:?}"))
        }
    })
}

/// Every id in `ids` was answered by exactly one `resolveMethodCall`, and
/// nothing else was answered.
pub fn resolved_exactly_once(ids: Vec<Option<RequestId>>) -> OracleFn {
    Box::new(move |world| {
        let answered: Vec<_> = world.resolved_calls().iter().map(|result| result.id()).collect();
        for id in &ids {
            let count = answered.iter().filter(|answer| *answer == id).count();
            if count != 1 {
                return Err(format!("call {id:?} answered {count} times"));
            }
        }
        if answered.len() != ids.len() {
            return Err(format!("expected {} answers, got {answered:?}", ids.len()));
        }
        Ok(())
    })
}

/// No host operation returned an error.
pub fn no_failures() -> OracleFn {
    Box::new(|world| match world.failures() {
        [] => Ok(()),
        failures => Err(format!("host operations failed: {failures:?}")),
    })
}
