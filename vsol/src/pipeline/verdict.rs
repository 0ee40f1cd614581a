//! Verdict classification of tool output
//!
//! Pure functions of the text. Anything that does not match the expected
//! shape is classified conservatively: not proved, counterexample found.

const BOOGIE_FINISHED: &str = "Boogie program verifier finished with ";
const BOOGIE_NO_ERRORS: &str = " verified, 0 errors";
const CORRAL_SEPARATOR: &str = "Boogie verification time";
const CORRAL_NO_BUGS: &str = "Program has no bugs";

/// `true` iff the verifier reports a completed run with zero errors
pub fn is_proof(boogie_output: &str) -> bool {
    boogie_output.contains(BOOGIE_FINISHED) && boogie_output.contains(BOOGIE_NO_ERRORS)
}

/// `true` iff the model checker found no counterexample within its bound.
///
/// The output must contain the timing line exactly once, and the text
/// before it must report "Program has no bugs".
pub fn is_bug_free(corral_output: &str) -> bool {
    let parts: Vec<&str> = corral_output.split(CORRAL_SEPARATOR).collect();
    parts.len() == 2 && parts[0].contains(CORRAL_NO_BUGS)
}
