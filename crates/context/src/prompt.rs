//! Fixed prompt text.
//!
//! The mindset block frames every analysis around business logic abuse
//! rather than classic technical bugs. It is deliberately a constant: the
//! framing is part of the product's behavior, not a tunable.

/// Analysis framing folded into the start of every assembled context.
pub const MINDSET: &str = "\
REQUIRED MINDSET:
- Think like a fraudster, not a developer
- Hunt for what is \"legally permitted but not intended\"
- Ignore classic technical bugs (XSS, SQLi)
- Focus on abuse of legitimate features

SYSTEMATIC ANALYSIS:
1. Understand the app's business model
2. Identify every money flow and point of value
3. Map user roles and their privileges
4. Spot multi-step workflows

QUESTIONS TO ALWAYS ASK:
- Can steps be bypassed?
- What happens with negative or extreme values?
- Can several features combine into an unintended result?
- Are race conditions possible?
- Are any limits client-side only?

PRIORITY TESTS:
- Price/quantity manipulation
- Bypassing time-based restrictions
- Promo code and discount abuse
- Privilege escalation through workflows
- Double spending/reuse";

/// System role sent alongside the assembled context.
pub const SYSTEM_PROMPT: &str = "You are a bug bounty expert specializing in \
business logic abuse. Answer concisely and actionably.";

/// Closing instruction when project history is included.
pub(crate) const ANALYZE_CLOSING: &str = "\
ANALYZE NOW:
Based on this request and the project history, suggest specific business \
logic abuse tests.
Focus on legal but unintended manipulations.
Propose 3 concrete tests with the exact values to try.";

/// Closing instruction for the short, history-free variant.
pub(crate) const SHORT_CLOSING: &str = "SUGGEST 3 TESTS:";
