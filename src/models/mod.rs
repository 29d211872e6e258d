pub mod answer;
pub mod difficulty;
pub mod question;
pub mod test_attempt;
