/// Post-build IR rewrites.
///
/// The only rewrite today is reduction fusion: a per-thread
/// multiply-accumulate over the thread index is replaced by one call to
/// the target's block-wide dot-product primitive. Rewrites are
/// structural. A statement that does not match in full is left alone.
use crate::config::TargetConfig;
use crate::ir::{Program, Stmt};

mod pattern;

pub use pattern::{hole, Captures, Pattern, RewriteRule};

/// `acc = acc + A[e2 + tid] * B[e3 + tid]`
///   → `acc = acc + fused_dot(A + e2, B + e3, block_width)`
pub fn fused_dot_rule(config: &TargetConfig) -> RewriteRule {
    let acc = hole("acc");
    let term = |buf: &str, off: &str| {
        Pattern::index(hole(buf), Pattern::add(hole(off), Pattern::ThreadIdx))
    };
    RewriteRule {
        name: "fused-dot".to_string(),
        target: acc.clone(),
        value: Pattern::add(acc.clone(), Pattern::mul(term("A", "e2"), term("B", "e3"))),
        new_target: acc.clone(),
        new_value: Pattern::add(
            acc,
            Pattern::call(
                &config.fused_dot,
                vec![
                    Pattern::add(hole("A"), hole("e2")),
                    Pattern::add(hole("B"), hole("e3")),
                    Pattern::Int(config.block_width as i64),
                ],
            ),
        ),
    }
}

/// Apply the fused-dot rewrite everywhere in `program`. Returns the
/// number of statements rewritten.
pub fn fuse_reductions(program: &mut Program, config: &TargetConfig) -> usize {
    let rules = [fused_dot_rule(config)];
    let n = rewrite_block(&mut program.body, &rules);
    if n > 0 {
        log::debug!("'{}': fused {} reduction(s)", program.name, n);
    }
    n
}

/// Apply `rules` to every statement of `body`, nested loops included.
pub fn rewrite_block(body: &mut [Stmt], rules: &[RewriteRule]) -> usize {
    let mut count = 0;
    for stmt in body.iter_mut() {
        if let Stmt::For { body, .. } = stmt {
            count += rewrite_block(body, rules);
            continue;
        }
        for rule in rules {
            if let Some(rewritten) = rule.apply(stmt) {
                log::debug!("{}: {}", rule.name, rewritten.to_string().trim_end());
                *stmt = rewritten;
                count += 1;
                break;
            }
        }
    }
    count
}
