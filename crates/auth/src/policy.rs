//! Static role → permission policy for the procurement suite.

use crate::{Permission, Role};

fn grants_for(role: &str) -> &'static [&'static str] {
    match role {
        "admin" => &["*"],
        "procurement_officer" => &[
            "requests.*",
            "purchases.*",
            "rfps.*",
            "budgets.read",
            "invoices.read",
            "settings.read",
        ],
        "finance" => &[
            "budgets.*",
            "invoices.*",
            "purchases.read",
            "requests.read",
            "settings.read",
        ],
        "evaluator" => &["rfps.read", "rfps.evaluate"],
        "requester" => &[
            "requests.read",
            "requests.create",
            "requests.update",
            "requests.submit",
            "requests.cancel",
        ],
        "viewer" => &[
            "budgets.read",
            "requests.read",
            "purchases.read",
            "invoices.read",
            "rfps.read",
        ],
        _ => &[],
    }
}

/// Resolve the effective permissions of a set of roles. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        for grant in grants_for(role.as_str()) {
            let perm = Permission::new(*grant);
            if !out.contains(&perm) {
                out.push(perm);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_roles_are_deduplicated() {
        let perms = permissions_for_roles(&[Role::new("viewer"), Role::new("evaluator")]);
        let reads = perms.iter().filter(|p| p.as_str() == "rfps.read").count();
        assert_eq!(reads, 1);
        assert!(perms.iter().any(|p| p.as_str() == "rfps.evaluate"));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        assert!(permissions_for_roles(&[Role::new("intern")]).is_empty());
    }
}
