use crate::db::operations::quiz::QuestionType;

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Case- and whitespace-insensitive answer check.
///
/// Fill-in-the-blank accepts any part of the expected text; typing accepts
/// containment in either direction. Blank answers are always wrong.
pub fn is_correct(question_type: QuestionType, user_answer: &str, correct_answer: &str) -> bool {
    let given = normalize(user_answer);
    let expected = normalize(correct_answer);
    if given.is_empty() || expected.is_empty() {
        return false;
    }

    match question_type {
        QuestionType::Mcq | QuestionType::Audio | QuestionType::Match => given == expected,
        QuestionType::FillBlank => given == expected || expected.contains(&given),
        QuestionType::Typing => expected.contains(&given) || given.contains(&expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_types_ignore_case_and_padding() {
        assert!(is_correct(QuestionType::Mcq, "  Love ", "love"));
        assert!(is_correct(QuestionType::Audio, "அன்பு", "அன்பு"));
        assert!(!is_correct(QuestionType::Mcq, "lov", "love"));
    }

    #[test]
    fn fill_blank_accepts_partial() {
        assert!(is_correct(QuestionType::FillBlank, "anb", "anbu"));
        assert!(!is_correct(QuestionType::FillBlank, "anbux", "anbu"));
    }

    #[test]
    fn typing_accepts_either_containment() {
        assert!(is_correct(QuestionType::Typing, "வீடு", "வீடு"));
        assert!(is_correct(QuestionType::Typing, "என் வீடு", "வீடு"));
        assert!(!is_correct(QuestionType::Typing, "நன்றி", "வீடு"));
    }

    #[test]
    fn blank_answer_is_wrong() {
        assert!(!is_correct(QuestionType::FillBlank, "   ", "anbu"));
        assert!(!is_correct(QuestionType::Typing, "", "வீடு"));
    }

    const ALL_TYPES: [QuestionType; 5] = [
        QuestionType::Mcq,
        QuestionType::FillBlank,
        QuestionType::Audio,
        QuestionType::Typing,
        QuestionType::Match,
    ];

    proptest! {
        #[test]
        fn padded_exact_answer_always_accepted(
            word in "[a-zA-Z]{1,12}",
            left in "[ \t]{0,3}",
            right in "[ \t]{0,3}",
        ) {
            let answer = format!("{left}{}{right}", word.to_uppercase());
            for question_type in ALL_TYPES {
                prop_assert!(is_correct(question_type, &answer, &word.to_lowercase()));
            }
        }

        #[test]
        fn whitespace_only_answer_never_accepted(blank in "[ \t\n]{0,6}", word in "[a-z]{1,8}") {
            for question_type in ALL_TYPES {
                prop_assert!(!is_correct(question_type, &blank, &word));
            }
        }
    }
}
