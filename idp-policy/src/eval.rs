use crate::{Effect, Matcher, Policy};
use log::debug;

/// Outcome of evaluating a policy set for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Evaluate `policies` for a `(subject, resource, action)` triple.
///
/// Deny-overrides: any applicable policy with [`Effect::Deny`] wins over any
/// number of applicable allows, independent of list order. When no policy
/// applies, including the empty set, the decision is [`Decision::Deny`].
pub fn evaluate(
    policies: &[Policy],
    subject: &str,
    resource: &str,
    action: &str,
    matcher: &dyn Matcher,
) -> Decision {
    let mut allowed = false;
    for policy in policies {
        if !matcher.matches(&policy.subjects, subject)
            || !matcher.matches(&policy.resources, resource)
            || !matcher.matches(&policy.actions, action)
        {
            continue;
        }
        match policy.effect {
            Effect::Deny => {
                debug!(
                    "request by '{}' on '{}' denied by policy '{}'",
                    subject, resource, policy.id
                );
                return Decision::Deny;
            }
            Effect::Allow => allowed = true,
        }
    }

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
