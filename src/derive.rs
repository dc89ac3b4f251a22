//! Fields that are pinned by the value of other fields.
//!
//! A targeted channel means exactly one channel. A forced output status makes
//! the timing fields meaningless, so (when the rules say so) they are zeroed
//! and locked. This runs after every edit and after every record load, so a
//! record saved under other rules still comes back consistent.

use crate::config::{ConfigForm, Field, TimeUnit};
use crate::validate::parse_field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationRules {
    /// Zero and lock the six timing fields while a force status is active.
    pub lock_timing_on_force: bool,
}

impl Default for DerivationRules {
    fn default() -> Self {
        Self { lock_timing_on_force: true }
    }
}

/// Anything but code 0 counts as set, unparsable text included.
fn is_set(form: &ConfigForm, field: Field) -> bool {
    parse_field(field, form.get(field), TimeUnit::Milliseconds) != Ok(0)
}

fn targets_single_channel(form: &ConfigForm) -> bool {
    is_set(form, Field::TargetChannel)
}

fn forces_status(form: &ConfigForm, rules: DerivationRules) -> bool {
    rules.lock_timing_on_force && is_set(form, Field::ForceStatus)
}

pub fn apply_derived_constraints(mut form: ConfigForm, rules: DerivationRules) -> ConfigForm {
    if targets_single_channel(&form) {
        form.set(Field::ChannelsQty, "1");
    }
    if forces_status(&form, rules) {
        for field in Field::TIMING {
            form.set(field, "0");
        }
    }
    form
}

/// Fields the user may not edit while the form is in its current state.
pub fn locked_fields(form: &ConfigForm, rules: DerivationRules) -> BTreeSet<Field> {
    let mut locked = BTreeSet::new();
    if targets_single_channel(form) {
        locked.insert(Field::ChannelsQty);
    }
    if forces_status(form, rules) {
        locked.extend(Field::TIMING);
    }
    locked
}
