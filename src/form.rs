//! The form being edited, with its errors kept current.

use crate::config::{ConfigForm, Configuration, Field, TimeUnit};
use crate::derive::{apply_derived_constraints, locked_fields, DerivationRules};
use crate::error::{Error, Result};
use crate::validate::{parse_field, validate, ValidationErrors};
use log::debug;
use std::collections::BTreeSet;

/// Edits go through [`set_field`](FormState::set_field), which re-derives
/// the pinned fields and rechecks whatever changed. The error map is always
/// the one a full [`validate`] of the current form would produce.
#[derive(Debug, Clone)]
pub struct FormState {
    form: ConfigForm,
    errors: ValidationErrors,
    rules: DerivationRules,
    unit: TimeUnit,
}

impl FormState {
    pub fn new(rules: DerivationRules, unit: TimeUnit) -> Self {
        Self::from_form(ConfigForm::default(), rules, unit)
    }

    pub fn from_form(form: ConfigForm, rules: DerivationRules, unit: TimeUnit) -> Self {
        let form = apply_derived_constraints(form, rules);
        let errors = validate(&form, unit);
        Self { form, errors, rules, unit }
    }

    pub fn form(&self) -> &ConfigForm {
        &self.form
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn locked(&self) -> BTreeSet<Field> {
        locked_fields(&self.form, self.rules)
    }

    /// Apply one edit. Returns `false` (and changes nothing) when the field
    /// is currently locked by another field's value.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> bool {
        if self.locked().contains(&field) {
            debug!("Ignoring edit of locked field {}", field);
            return false;
        }
        let before = self.form.clone();
        self.form.set(field, value);
        self.form = apply_derived_constraints(std::mem::take(&mut self.form), self.rules);

        for f in Field::ALL {
            if f == field || before.get(f) != self.form.get(f) {
                self.errors.revalidate(f, self.form.get(f), self.unit);
            }
        }
        true
    }

    /// Replace the form with a stored configuration, re-deriving under the
    /// current rules.
    pub fn load(&mut self, config: &Configuration) {
        *self = Self::from_form(ConfigForm::from_configuration(config, self.unit), self.rules, self.unit);
    }

    /// Switch the entry unit, carrying valid timing values across.
    pub fn set_unit(&mut self, unit: TimeUnit) {
        if unit == self.unit {
            return;
        }
        let mut form = self.form.clone();
        for field in Field::TIMING {
            if let Ok(millis) = parse_field(field, self.form.get(field), self.unit) {
                form.set(field, unit.display_millis(millis));
            }
        }
        *self = Self::from_form(form, self.rules, unit);
    }

    /// The typed record, or [`Error::Invalid`] while any field is invalid.
    pub fn configuration(&self) -> Result<Configuration> {
        if !self.errors.is_empty() {
            return Err(Error::Invalid(self.errors.clone()));
        }
        self.form.to_configuration(self.unit).map_err(Error::Invalid)
    }
}
