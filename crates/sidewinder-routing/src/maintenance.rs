//! Maintenance decisions.
//!
//! Runs once per maintain interval. Expired neighbour paths get torn
//! down, and a bootstrap goes out whenever the ascending side is missing
//! or was installed under a root announcement that has since changed.
//! The interval timer and cancellation live in the event loop that calls
//! this; the decision itself stays synchronous.

use crate::env::SnekDriver;
use crate::router::SnekRouter;

impl SnekRouter {
    /// One maintenance pass at monotonic time `now`.
    pub fn maintain<D: SnekDriver>(&mut self, driver: &mut D, now: u64) {
        let root = driver.root_announcement();
        let can_bootstrap =
            driver.parent().is_some() && root.root_public_key != self.public_key;
        let mut will_bootstrap = false;

        if let Some(asc) = self.ascending_entry() {
            let expired = !asc.valid(now);
            let root_changed = asc.root_public_key != root.root_public_key
                || asc.root_sequence != root.root_sequence;
            let (path_key, path_id) = (asc.index.public_key, asc.index.path_id);

            if expired {
                let local = driver.local();
                self.send_teardown_for_existing_path(driver, local, path_key, path_id, now);
                will_bootstrap = can_bootstrap;
            } else if root_changed {
                will_bootstrap = can_bootstrap;
            }
        } else {
            will_bootstrap = can_bootstrap;
        }

        if let Some(desc) = self.descending_entry() {
            if !desc.valid(now) {
                let (path_key, path_id) = (desc.index.public_key, desc.index.path_id);
                let local = driver.local();
                self.send_teardown_for_existing_path(driver, local, path_key, path_id, now);
            }
        }

        if will_bootstrap {
            self.bootstrap_now(driver, now);
        }
    }
}
