//! Search predicates over users.
//!
//! Every search endpoint is reduced to one [`UserFilter`]. The PostgreSQL
//! store renders it as a `WHERE` clause, the in-memory store evaluates it
//! with [`UserFilter::matches`]; both must agree on every case.

use sqlx::{Postgres, QueryBuilder};
use time::{Duration, OffsetDateTime, Time, UtcOffset};

use crate::users::repo_types::User;

#[derive(Debug, Clone, PartialEq)]
pub enum UserFilter {
    All,
    /// Case-insensitive substring match; both parts must hold when both are set.
    Name {
        firstname: Option<String>,
        lastname: Option<String>,
    },
    SalaryBetween { min: f64, max: f64 },
    AgeBetween { min: i32, max: i32 },
    /// `registerday` strictly after the instant.
    RegisteredAfter(OffsetDateTime),
    /// `registerday` in `[range.start, range.end)`.
    RegisteredWithin(DayRange),
    NeverSignedIn,
}

impl UserFilter {
    /// Builds a name filter, ignoring blank parts. `None` when nothing is left to match on.
    pub fn name(firstname: Option<&str>, lastname: Option<&str>) -> Option<Self> {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let firstname = clean(firstname);
        let lastname = clean(lastname);
        if firstname.is_none() && lastname.is_none() {
            return None;
        }
        Some(Self::Name {
            firstname,
            lastname,
        })
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            Self::All => true,
            Self::Name {
                firstname,
                lastname,
            } => {
                firstname
                    .as_deref()
                    .map_or(true, |f| contains_ignore_case(&user.firstname, f))
                    && lastname
                        .as_deref()
                        .map_or(true, |l| contains_ignore_case(&user.lastname, l))
            }
            Self::SalaryBetween { min, max } => *min <= user.salary && user.salary <= *max,
            Self::AgeBetween { min, max } => *min <= user.age && user.age <= *max,
            Self::RegisteredAfter(at) => user.registerday > *at,
            Self::RegisteredWithin(range) => range.contains(user.registerday),
            Self::NeverSignedIn => user.signintime.is_none(),
        }
    }

    /// Appends the `WHERE` clause (if any) for this filter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::All => {}
            Self::Name {
                firstname,
                lastname,
            } => {
                qb.push(" WHERE ");
                let mut conds = qb.separated(" AND ");
                if let Some(f) = firstname {
                    conds
                        .push("firstname ILIKE ")
                        .push_bind_unseparated(like_pattern(f));
                }
                if let Some(l) = lastname {
                    conds
                        .push("lastname ILIKE ")
                        .push_bind_unseparated(like_pattern(l));
                }
            }
            Self::SalaryBetween { min, max } => {
                qb.push(" WHERE salary >= ")
                    .push_bind(*min)
                    .push(" AND salary <= ")
                    .push_bind(*max);
            }
            Self::AgeBetween { min, max } => {
                qb.push(" WHERE age >= ")
                    .push_bind(*min)
                    .push(" AND age <= ")
                    .push_bind(*max);
            }
            Self::RegisteredAfter(at) => {
                qb.push(" WHERE registerday > ").push_bind(*at);
            }
            Self::RegisteredWithin(range) => {
                qb.push(" WHERE registerday >= ")
                    .push_bind(range.start)
                    .push(" AND registerday < ")
                    .push_bind(range.end);
            }
            Self::NeverSignedIn => {
                qb.push(" WHERE signintime IS NULL");
            }
        }
    }
}

/// Half-open calendar day `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl DayRange {
    /// The calendar day containing `instant`, as seen from `offset`.
    pub fn containing(instant: OffsetDateTime, offset: UtcOffset) -> Self {
        let start = instant.to_offset(offset).replace_time(Time::MIDNIGHT);
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// `%needle%` with LIKE metacharacters escaped (backslash is the default escape).
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};
    use uuid::Uuid;

    fn user(first: &str, last: &str, salary: f64, age: i32, day: OffsetDateTime) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("{}.{}", first, last).to_lowercase(),
            password_hash: String::new(),
            firstname: first.into(),
            lastname: last.into(),
            salary,
            age,
            registerday: day,
            signintime: None,
        }
    }

    #[test]
    fn name_filter_requires_a_non_blank_part() {
        assert!(UserFilter::name(None, None).is_none());
        assert!(UserFilter::name(Some("  "), Some("")).is_none());
        assert_eq!(
            UserFilter::name(Some(" Jo "), None),
            Some(UserFilter::Name {
                firstname: Some("Jo".into()),
                lastname: None
            })
        );
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let u = user("Johnny", "Appleseed", 1.0, 1, datetime!(2024-01-01 0:00 UTC));
        assert!(UserFilter::name(Some("OHN"), None).unwrap().matches(&u));
        assert!(UserFilter::name(None, Some("seed")).unwrap().matches(&u));
        assert!(UserFilter::name(Some("john"), Some("apple")).unwrap().matches(&u));
        assert!(!UserFilter::name(Some("john"), Some("pear")).unwrap().matches(&u));
    }

    #[test]
    fn ranges_are_inclusive() {
        let u = user("A", "B", 50000.0, 30, datetime!(2024-01-01 0:00 UTC));
        let salary = |min, max| UserFilter::SalaryBetween { min, max }.matches(&u);
        let age = |min, max| UserFilter::AgeBetween { min, max }.matches(&u);
        assert!(salary(50000.0, 60000.0));
        assert!(salary(40000.0, 50000.0));
        assert!(!salary(50000.01, 60000.0));
        assert!(age(30, 30));
        assert!(!age(31, 20));
    }

    #[test]
    fn registered_after_is_strict() {
        let at = datetime!(2024-01-01 12:00 UTC);
        assert!(!UserFilter::RegisteredAfter(at).matches(&user("A", "B", 0.0, 0, at)));
        assert!(UserFilter::RegisteredAfter(at)
            .matches(&user("A", "B", 0.0, 0, at + Duration::milliseconds(1))));
    }

    #[test]
    fn day_range_is_half_open_in_the_given_offset() {
        let range = DayRange::containing(datetime!(2024-03-10 23:30 UTC), offset!(UTC));
        assert_eq!(range.start, datetime!(2024-03-10 0:00 UTC));
        assert_eq!(range.end, datetime!(2024-03-11 0:00 UTC));
        assert!(range.contains(datetime!(2024-03-10 0:00 UTC)));
        assert!(!range.contains(datetime!(2024-03-11 0:00 UTC)));

        // 23:30 UTC is already the next day at +02:00
        let shifted = DayRange::containing(datetime!(2024-03-10 23:30 UTC), offset!(+2));
        assert_eq!(shifted.start, datetime!(2024-03-11 0:00 +2));
        assert!(!shifted.contains(datetime!(2024-03-10 12:00 UTC)));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }

    fn rendered(filter: &UserFilter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM users");
        filter.push_where(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn push_where_renders_every_variant() {
        let day = DayRange::containing(datetime!(2024-03-10 9:00 UTC), offset!(UTC));
        let cases = [
            (UserFilter::All, "SELECT * FROM users"),
            (
                UserFilter::name(Some("a"), Some("b")).unwrap(),
                "SELECT * FROM users WHERE firstname ILIKE $1 AND lastname ILIKE $2",
            ),
            (
                UserFilter::name(None, Some("b")).unwrap(),
                "SELECT * FROM users WHERE lastname ILIKE $1",
            ),
            (
                UserFilter::SalaryBetween { min: 1.0, max: 2.0 },
                "SELECT * FROM users WHERE salary >= $1 AND salary <= $2",
            ),
            (
                UserFilter::AgeBetween { min: 18, max: 65 },
                "SELECT * FROM users WHERE age >= $1 AND age <= $2",
            ),
            (
                UserFilter::RegisteredAfter(day.start),
                "SELECT * FROM users WHERE registerday > $1",
            ),
            (
                UserFilter::RegisteredWithin(day),
                "SELECT * FROM users WHERE registerday >= $1 AND registerday < $2",
            ),
            (
                UserFilter::NeverSignedIn,
                "SELECT * FROM users WHERE signintime IS NULL",
            ),
        ];
        for (filter, sql) in cases {
            assert_eq!(rendered(&filter), sql, "{filter:?}");
        }
    }
}
