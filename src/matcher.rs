//! Name matching between spreadsheet rows and system users.
//!
//! Strategies run in order and the first one that finds any candidate wins.
//! Within a strategy, ties resolve on the candidate's sort key so the outcome
//! never depends on the order candidates were loaded in.

use uuid::Uuid;

use crate::models::{LoggedActivity, Profile, ReportRow};

/// Anything that carries a person's full name and email.
pub trait Person {
    fn full_name(&self) -> &str;
    fn email(&self) -> &str;

    fn sort_key(&self) -> (String, String, Uuid) {
        (normalize(self.email()), normalize(self.full_name()), Uuid::nil())
    }
}

impl Person for Profile {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn sort_key(&self) -> (String, String, Uuid) {
        (normalize(&self.email), normalize(&self.full_name), self.id)
    }
}

impl Person for LoggedActivity {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn sort_key(&self) -> (String, String, Uuid) {
        (normalize(&self.email), normalize(&self.full_name), self.log.user_id)
    }
}

impl Person for ReportRow {
    fn full_name(&self) -> &str {
        &self.employee_name
    }

    fn email(&self) -> &str {
        &self.employee_email
    }
}

/// Lowercases and collapses internal whitespace.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, subject: &dyn Person, candidate: &dyn Person) -> bool;
}

pub struct ExactName;

impl MatchStrategy for ExactName {
    fn name(&self) -> &'static str {
        "exact_name"
    }

    fn matches(&self, subject: &dyn Person, candidate: &dyn Person) -> bool {
        let left = normalize(subject.full_name());
        !left.is_empty() && left == normalize(candidate.full_name())
    }
}

/// Either full name contains the other.
pub struct NameContainment;

impl MatchStrategy for NameContainment {
    fn name(&self) -> &'static str {
        "name_containment"
    }

    fn matches(&self, subject: &dyn Person, candidate: &dyn Person) -> bool {
        let left = normalize(subject.full_name());
        let right = normalize(candidate.full_name());
        if left.is_empty() || right.is_empty() {
            return false;
        }
        left.contains(&right) || right.contains(&left)
    }
}

pub struct EmailEquality;

impl MatchStrategy for EmailEquality {
    fn name(&self) -> &'static str {
        "email"
    }

    fn matches(&self, subject: &dyn Person, candidate: &dyn Person) -> bool {
        let left = subject.email().trim().to_lowercase();
        !left.is_empty() && left == candidate.email().trim().to_lowercase()
    }
}

#[derive(Debug)]
pub struct MatchOutcome<'a, C> {
    pub candidate: &'a C,
    pub strategy: &'static str,
}

/// One subject paired with one candidate by [`Matcher::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub subject: usize,
    pub candidate: usize,
    pub strategy: &'static str,
}

pub struct Matcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new(vec![
            Box::new(ExactName),
            Box::new(NameContainment),
            Box::new(EmailEquality),
        ])
    }
}

impl Matcher {
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Matcher { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn find<'a, C: Person>(
        &self,
        subject: &dyn Person,
        candidates: &'a [C],
    ) -> Option<MatchOutcome<'a, C>> {
        for strategy in &self.strategies {
            let best = candidates
                .iter()
                .filter(|candidate| strategy.matches(subject, *candidate))
                .min_by(|a, b| a.sort_key().cmp(&b.sort_key()));

            if let Some(candidate) = best {
                return Some(MatchOutcome {
                    candidate,
                    strategy: strategy.name(),
                });
            }
        }
        None
    }

    /// Pairs subjects with candidates one to one.
    ///
    /// Each strategy runs across every unpaired subject before the next one is
    /// tried, so a looser match can never take a candidate that a stricter
    /// strategy would pair elsewhere. Subjects are visited in sort-key order and
    /// take the first unpaired candidate, in slice order, that the strategy
    /// accepts. Results come back ordered by candidate index.
    pub fn assign<S: Person, C: Person>(&self, subjects: &[S], candidates: &[C]) -> Vec<Assignment> {
        let mut order: Vec<usize> = (0..subjects.len()).collect();
        order.sort_by_key(|index| subjects[*index].sort_key());

        let mut subject_paired = vec![false; subjects.len()];
        let mut candidate_paired = vec![false; candidates.len()];
        let mut assignments = Vec::new();

        for strategy in &self.strategies {
            for &subject in &order {
                if subject_paired[subject] {
                    continue;
                }
                let found = candidates.iter().enumerate().find(|(index, candidate)| {
                    !candidate_paired[*index] && strategy.matches(&subjects[subject], *candidate)
                });
                if let Some((candidate, _)) = found {
                    subject_paired[subject] = true;
                    candidate_paired[candidate] = true;
                    assignments.push(Assignment {
                        subject,
                        candidate,
                        strategy: strategy.name(),
                    });
                }
            }
        }

        assignments.sort_by_key(|assignment| assignment.candidate);
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metrics, Role};

    fn profile(name: &str, email: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: email.to_string(),
            role: Role::Recruiter,
        }
    }

    fn row(name: &str, email: &str) -> ReportRow {
        ReportRow {
            employee_name: name.to_string(),
            employee_email: email.to_string(),
            metrics: Metrics::default(),
        }
    }

    #[test]
    fn exact_name_ignores_case_and_spacing() {
        let subject = row("  JANE   doe ", "x@x.com");
        assert!(ExactName.matches(&subject, &profile("Jane Doe", "jane@company.com")));
        assert!(!ExactName.matches(&subject, &profile("Jane Doerr", "jane@company.com")));
    }

    #[test]
    fn containment_works_in_both_directions() {
        let short = row("Jane Doe", "a@a.com");
        let long = profile("Jane Doe Smith", "b@b.com");
        assert!(NameContainment.matches(&short, &long));
        assert!(NameContainment.matches(&long, &short));
        assert!(!NameContainment.matches(&row("", "a@a.com"), &long));
    }

    #[test]
    fn email_comparison_is_case_insensitive() {
        let subject = row("J. D.", "Jane.Doe@Company.com");
        assert!(EmailEquality.matches(&subject, &profile("Someone", "jane.doe@company.com")));
        assert!(!EmailEquality.matches(&row("x", ""), &profile("Someone", "")));
    }

    #[test]
    fn prefers_exact_over_substring_over_email() {
        let subject = row("Jane Doe", "jd@company.com");
        let by_email = profile("Unrelated Person", "jd@company.com");
        let by_substring = profile("Jane Doe Smith", "jds@company.com");
        let exact = profile("jane doe", "jane@company.com");

        let matcher = Matcher::default();
        let users = vec![by_email.clone(), by_substring.clone(), exact.clone()];
        let outcome = matcher.find(&subject, &users).unwrap();
        assert_eq!(outcome.candidate.id, exact.id);
        assert_eq!(outcome.strategy, "exact_name");

        let users = vec![by_email.clone(), by_substring.clone()];
        let outcome = matcher.find(&subject, &users).unwrap();
        assert_eq!(outcome.candidate.id, by_substring.id);
        assert_eq!(outcome.strategy, "name_containment");

        let users = vec![by_email.clone()];
        let outcome = matcher.find(&subject, &users).unwrap();
        assert_eq!(outcome.candidate.id, by_email.id);
        assert_eq!(outcome.strategy, "email");
    }

    #[test]
    fn result_does_not_depend_on_candidate_order() {
        let subject = row("Lee", "lee@company.com");
        let a = profile("Lee Adams", "adams@company.com");
        let b = profile("Lee Brown", "brown@company.com");
        let matcher = Matcher::default();

        let forward = vec![a.clone(), b.clone()];
        let backward = vec![b.clone(), a.clone()];
        let first = matcher.find(&subject, &forward).unwrap().candidate.id;
        let second = matcher.find(&subject, &backward).unwrap().candidate.id;
        assert_eq!(first, second);
        assert_eq!(first, a.id);
    }

    #[test]
    fn no_match_returns_none() {
        let subject = row("Jane Doe", "jane@company.com");
        let users = vec![profile("Sam Park", "sam@company.com")];
        assert!(Matcher::default().find(&subject, &users).is_none());
    }

    #[test]
    fn assign_runs_each_strategy_across_all_pairs_first() {
        let rows = vec![row("Jane", "j@company.com"), row("Jane Doe", "jd@company.com")];
        let users = vec![profile("Jane Doe", "jane.doe@company.com")];

        let assignments = Matcher::default().assign(&users, &rows);
        assert_eq!(
            assignments,
            vec![Assignment {
                subject: 0,
                candidate: 1,
                strategy: "exact_name",
            }]
        );
    }

    #[test]
    fn assign_pairs_each_side_at_most_once() {
        let rows = vec![
            row("Lee Adams", "adams@company.com"),
            row("Lee Adams Jr", "jr@company.com"),
            row("Nobody", "nobody@company.com"),
        ];
        let adams = profile("Lee Adams", "adams@company.com");
        let lee = profile("Lee", "lee@company.com");

        let forward_users = vec![adams.clone(), lee.clone()];
        let backward_users = vec![lee.clone(), adams.clone()];
        let forward = Matcher::default().assign(&forward_users, &rows);
        let backward = Matcher::default().assign(&backward_users, &rows);

        let expected = vec![(adams.id, 0, "exact_name"), (lee.id, 1, "name_containment")];
        assert_eq!(paired_ids(&forward_users, &forward), expected);
        assert_eq!(paired_ids(&backward_users, &backward), expected);
    }

    fn paired_ids(users: &[Profile], found: &[Assignment]) -> Vec<(Uuid, usize, &'static str)> {
        found
            .iter()
            .map(|a| (users[a.subject].id, a.candidate, a.strategy))
            .collect()
    }

    #[test]
    fn custom_strategy_order_is_respected() {
        let matcher = Matcher::new(vec![Box::new(EmailEquality), Box::new(ExactName)]);
        assert_eq!(matcher.strategy_names(), vec!["email", "exact_name"]);

        let subject = row("Jane Doe", "jd@company.com");
        let users = vec![
            profile("Jane Doe", "jane@company.com"),
            profile("Other", "jd@company.com"),
        ];
        let outcome = matcher.find(&subject, &users).unwrap();
        assert_eq!(outcome.strategy, "email");
        assert_eq!(outcome.candidate.id, users[1].id);
    }
}
