//! Property-based invariants for geometry and content-tree helpers.
//!
//! 1. **Distance symmetry**: `a.axis_distance(b) == b.axis_distance(a)`.
//! 2. **Per-axis bound**: `within` holds exactly when both axis
//!    displacements are at most the threshold.
//! 3. **Safe parent**: for any chain of nested plugin elements, the safe
//!    parent of the innermost one is the nearest non-plugin ancestor.
//! 4. **Staleness**: a captured surface reference stops resolving once its
//!    element is removed, even if the slot is reused.
//! 5. **Site matching**: a disabled site disables itself and every
//!    subdomain, and nothing else.

use plugclick_core::document::{ContentTree, Document, NodeKind, PluginSurfaceRef, safe_parent};
use plugclick_core::geometry::Point;
use plugclick_core::policy::{SimulationPolicy, SitePolicy};
use proptest::prelude::*;

const FLASH: &str = "application/x-shockwave-flash";

// ── Strategies ──────────────────────────────────────────────────────────

fn point() -> impl Strategy<Value = Point> {
    (-5_000i32..5_000, -5_000i32..5_000).prop_map(|(x, y)| Point::new(x, y))
}

fn label() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

// ── Geometry ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn axis_distance_is_symmetric(a in point(), b in point()) {
        prop_assert_eq!(a.axis_distance(b), b.axis_distance(a));
        prop_assert_eq!(a.chebyshev_distance(a), 0);
    }

    #[test]
    fn within_is_per_axis(a in point(), b in point(), threshold in 0u32..50) {
        let (dx, dy) = a.axis_distance(b);
        prop_assert_eq!(a.within(b, threshold), dx <= threshold && dy <= threshold);
    }
}

// ── Content tree ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn safe_parent_skips_any_plugin_chain(depth in 1usize..8, wrappers in 0usize..4) {
        let mut doc = Document::new("https://example.org/");
        let mut host = doc.root();
        for _ in 0..wrappers {
            host = doc.append(host, NodeKind::element("div"));
        }
        let mut innermost = host;
        for _ in 0..depth {
            innermost = doc.append(innermost, NodeKind::plugin(FLASH));
        }
        prop_assert!(doc.is_plugin_content(innermost));
        prop_assert_eq!(safe_parent(&doc, innermost), Some(host));
    }

    #[test]
    fn removed_surface_never_resolves(reuse in 0usize..4) {
        let mut doc = Document::new("https://example.org/");
        let body = doc.append(doc.root(), NodeKind::element("body"));
        let plugin = doc.append(body, NodeKind::plugin(FLASH));
        let surface = PluginSurfaceRef::capture(&doc, plugin).expect("plugin content");

        doc.remove(plugin);
        for _ in 0..reuse {
            doc.append(body, NodeKind::plugin(FLASH));
        }
        prop_assert_eq!(surface.resolve(&doc), None);
        prop_assert_eq!(surface.safe_parent(&doc), None);
    }
}

// ── Site policy ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn disabled_site_covers_subdomains(site in label(), sub in label(), other in label()) {
        let domain = format!("{site}.example");
        let policy = SitePolicy::new(true, [domain.as_str()]);

        let own = format!("https://{domain}/page");
        let nested = format!("https://{sub}.{domain}/page");
        prop_assert!(!policy.is_simulation_enabled_for_location(&own));
        prop_assert!(!policy.is_simulation_enabled_for_location(&nested));

        // Sharing a suffix without a dot boundary is a different site.
        let lookalike = format!("https://{other}{domain}/");
        prop_assert!(policy.is_simulation_enabled_for_location(&lookalike));
    }
}
