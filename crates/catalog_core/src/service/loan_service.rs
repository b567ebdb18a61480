//! Loan use-cases: librarian renewal and lending, reader mark-as-read.
//!
//! # Invariants
//! - Renewal changes `due_back` only, and only for an existing copy.
//! - Renewal dates fall within `[today, today + max_renewal_weeks]` unless
//!   the policy allows past dates.
//! - Mark-as-read credits a copy's pages once per loan and returns the copy
//!   to the shelf in the same transaction.

use super::{retry_on_conflict, ServiceError, ServiceResult};
use crate::access::{Capability, Grant, RequestContext};
use crate::model::loan::{BookInstance, BookInstanceId, NewBookInstance};
use crate::model::reader::UserId;
use crate::model::ValidationError;
use crate::repo::loan_repo::LoanRepository;
use crate::repo::reader_repo::{ReadCredit, ReaderRepository};
use chrono::{Days, NaiveDate};
use log::{info, warn};

const RENEWAL_FIELD: &str = "renewal_date";

/// Renewal date rules applied to librarian renewals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    /// Offset of the proposed renewal date shown on first render.
    pub default_renewal_weeks: u32,
    /// Latest accepted renewal date, in weeks from today.
    pub max_renewal_weeks: u32,
    pub allow_past_due_dates: bool,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            default_renewal_weeks: 3,
            max_renewal_weeks: 4,
            allow_past_due_dates: false,
        }
    }
}

impl LoanPolicy {
    pub fn proposed_renewal_date(&self, today: NaiveDate) -> NaiveDate {
        add_weeks(today, self.default_renewal_weeks)
    }

    pub fn validate_renewal(
        &self,
        today: NaiveDate,
        renewal_date: NaiveDate,
    ) -> Result<(), ValidationError> {
        if renewal_date < today && !self.allow_past_due_dates {
            return Err(ValidationError::new(
                RENEWAL_FIELD,
                "Invalid date - renewal in past",
            ));
        }
        if renewal_date > add_weeks(today, self.max_renewal_weeks) {
            return Err(ValidationError::new(
                RENEWAL_FIELD,
                format!(
                    "Invalid date - renewal more than {} weeks ahead",
                    self.max_renewal_weeks
                ),
            ));
        }
        Ok(())
    }
}

fn add_weeks(date: NaiveDate, weeks: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(weeks) * 7))
        .unwrap_or(NaiveDate::MAX)
}

pub struct LoanService<L: LoanRepository, R: ReaderRepository> {
    loans: L,
    readers: R,
    policy: LoanPolicy,
}

impl<L: LoanRepository, R: ReaderRepository> LoanService<L, R> {
    pub fn new(loans: L, readers: R) -> Self {
        Self::with_policy(loans, readers, LoanPolicy::default())
    }

    pub fn with_policy(loans: L, readers: R, policy: LoanPolicy) -> Self {
        Self {
            loans,
            readers,
            policy,
        }
    }

    /// Initial value of the renewal form.
    pub fn proposed_renewal_date(&self, today: NaiveDate) -> NaiveDate {
        self.policy.proposed_renewal_date(today)
    }

    /// Sets a new due date on one copy.
    ///
    /// # Errors
    /// - `NotFound` when the copy does not exist; nothing is written.
    /// - `ValidationFailed` when the date is outside the policy window.
    pub fn renew(
        &self,
        grant: &Grant,
        id: BookInstanceId,
        renewal_date: NaiveDate,
        today: NaiveDate,
    ) -> ServiceResult<BookInstance> {
        grant.ensure(Capability::CanMarkReturned)?;
        if self.loans.get_instance(id)?.is_none() {
            return Err(not_found(id));
        }
        self.policy.validate_renewal(today, renewal_date)?;

        let instance = retry_on_conflict("loan_renew", || self.loans.set_due_back(id, renewal_date))?;
        info!(
            "event=loan_renew module=loan status=ok instance_id={} librarian_id={}",
            id,
            grant.user()
        );
        Ok(instance)
    }

    /// Credits the acting user's reading total with the copy's pages and
    /// returns the copy to the shelf.
    ///
    /// # Errors
    /// - `PermissionDenied` for anonymous callers.
    /// - `NotFound` when the copy is missing or not borrowed by the caller.
    /// - `StorageConflict` when the write lock stays busy after one retry.
    pub fn mark_as_read(
        &self,
        ctx: &RequestContext,
        id: BookInstanceId,
    ) -> ServiceResult<ReadCredit> {
        let user = ctx.require_user()?;
        let result = retry_on_conflict("loan_mark_read", || self.readers.record_book_read(user, id));
        match &result {
            Ok(credit) => info!(
                "event=loan_mark_read module=reader status=ok instance_id={} user_id={} pages={} total={} profile_created={}",
                id,
                user,
                credit.pages_credited,
                credit.profile.total_pages_read,
                credit.profile_created
            ),
            Err(err) => warn!(
                "event=loan_mark_read module=reader status=error instance_id={} user_id={} error={}",
                id, user, err
            ),
        }
        result
    }

    /// Registers a new physical copy.
    pub fn create_instance(
        &self,
        grant: &Grant,
        instance: &NewBookInstance,
    ) -> ServiceResult<BookInstance> {
        grant.ensure(Capability::AddBookInstance)?;
        let created = self.loans.create_instance(instance)?;
        info!(
            "event=instance_create module=loan status=ok instance_id={}",
            created.id
        );
        Ok(created)
    }

    /// Puts one copy on loan to `borrower` until `due_back`.
    ///
    /// # Errors
    /// - `NotFound` when the copy or the borrower does not exist.
    /// - `ValidationFailed` when the copy is already on loan; the check runs
    ///   inside the repository write, so a racing lend cannot overwrite it.
    pub fn lend_instance(
        &self,
        grant: &Grant,
        id: BookInstanceId,
        borrower: UserId,
        due_back: NaiveDate,
    ) -> ServiceResult<BookInstance> {
        grant.ensure(Capability::CanMarkReturned)?;
        if self.loans.get_instance(id)?.is_none() {
            return Err(not_found(id));
        }
        if self.readers.get_user(borrower)?.is_none() {
            return Err(ServiceError::NotFound {
                entity: "user",
                id: borrower.to_string(),
            });
        }

        let lent = retry_on_conflict("loan_lend", || self.loans.lend_instance(id, borrower, due_back))?;
        info!(
            "event=loan_lend module=loan status=ok instance_id={} borrower_id={}",
            id, borrower
        );
        Ok(lent)
    }
}

fn not_found(id: BookInstanceId) -> ServiceError {
    ServiceError::NotFound {
        entity: "book instance",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::LoanPolicy;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn proposed_renewal_is_three_weeks_out() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.proposed_renewal_date(date(2024, 11, 9)), date(2024, 11, 30));
    }

    #[test]
    fn renewal_window_is_today_through_four_weeks() {
        let policy = LoanPolicy::default();
        let today = date(2024, 11, 9);
        assert!(policy.validate_renewal(today, today).is_ok());
        assert!(policy.validate_renewal(today, date(2024, 12, 7)).is_ok());

        let past = policy.validate_renewal(today, date(2024, 11, 8)).unwrap_err();
        assert_eq!(past.field, "renewal_date");
        assert!(past.message.contains("past"));

        let far = policy.validate_renewal(today, date(2024, 12, 8)).unwrap_err();
        assert!(far.message.contains("4 weeks"));
    }

    #[test]
    fn past_dates_allowed_when_policy_permits() {
        let policy = LoanPolicy {
            allow_past_due_dates: true,
            ..LoanPolicy::default()
        };
        assert!(policy
            .validate_renewal(date(2024, 11, 9), date(2020, 1, 1))
            .is_ok());
    }
}
