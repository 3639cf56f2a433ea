//! Question generation
//!
//! Builds one [`NewQuestion`] per word, each with a type drawn at random
//! from the requested list. `match` questions are emitted as `mcq`.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use crate::db::operations::quiz::{NewQuestion, QuestionType};
use crate::db::operations::word::Word;

/// Options shown on a multiple-choice question, correct answer included
pub const MCQ_OPTION_COUNT: usize = 4;

pub fn generate_questions<R: Rng + ?Sized>(
    words: &[Word],
    distractor_pool: &[Word],
    question_types: &[QuestionType],
    rng: &mut R,
) -> Vec<NewQuestion> {
    let types: &[QuestionType] = if question_types.is_empty() {
        &QuestionType::DEFAULTS
    } else {
        question_types
    };

    words
        .iter()
        .map(|word| {
            let question_type = types.choose(rng).copied().unwrap_or(QuestionType::Mcq);
            generate_question(word, distractor_pool, question_type, rng)
        })
        .collect()
}

pub fn generate_question<R: Rng + ?Sized>(
    word: &Word,
    distractor_pool: &[Word],
    question_type: QuestionType,
    rng: &mut R,
) -> NewQuestion {
    match question_type {
        QuestionType::Mcq | QuestionType::Match => multiple_choice(word, distractor_pool, rng),
        QuestionType::FillBlank => fill_blank(word),
        QuestionType::Audio => NewQuestion {
            word_id: word.id.clone(),
            question_type: QuestionType::Audio,
            question_text: "Listen and type what you hear:".to_string(),
            correct_answer: word.tamil_word.clone(),
            answer_options: Vec::new(),
            explanation: explanation(word),
        },
        QuestionType::Typing => NewQuestion {
            word_id: word.id.clone(),
            question_type: QuestionType::Typing,
            question_text: format!("Type the Tamil word for: {}", word.primary_meaning()),
            correct_answer: word.tamil_word.clone(),
            answer_options: Vec::new(),
            explanation: explanation(word),
        },
    }
}

fn multiple_choice<R: Rng + ?Sized>(
    word: &Word,
    distractor_pool: &[Word],
    rng: &mut R,
) -> NewQuestion {
    let tamil_to_english = rng.random_bool(0.5);

    let (question_text, correct_answer) = if tamil_to_english {
        (
            format!("What does '{}' mean?", word.tamil_word),
            word.primary_meaning().to_string(),
        )
    } else {
        (
            format!("How do you say '{}' in Tamil?", word.primary_meaning()),
            word.tamil_word.clone(),
        )
    };

    let mut candidates: Vec<String> = Vec::new();
    for other in distractor_pool.iter().filter(|other| other.id != word.id) {
        let option = if tamil_to_english {
            other.primary_meaning()
        } else {
            other.tamil_word.as_str()
        };
        if !option.is_empty() && option != correct_answer && !candidates.iter().any(|c| c == option)
        {
            candidates.push(option.to_string());
        }
    }
    candidates.shuffle(rng);
    candidates.truncate(MCQ_OPTION_COUNT - 1);

    while candidates.len() < MCQ_OPTION_COUNT - 1 {
        candidates.push(format!("Option {}", candidates.len() + 1));
    }

    let mut options = candidates;
    options.push(correct_answer.clone());
    options.shuffle(rng);

    NewQuestion {
        word_id: word.id.clone(),
        question_type: QuestionType::Mcq,
        question_text,
        correct_answer,
        answer_options: options,
        explanation: explanation(word),
    }
}

/// Blanks the word out of its Tamil example; without a usable example
/// the learner is asked for the transliteration instead.
fn fill_blank(word: &Word) -> NewQuestion {
    let has_example = !word.example_tamil.is_empty()
        && !word.example_english.is_empty()
        && word.example_tamil.contains(&word.tamil_word);

    let (question_text, correct_answer) = if has_example {
        (
            format!(
                "Complete: {}",
                word.example_tamil.replace(&word.tamil_word, "____")
            ),
            word.tamil_word.clone(),
        )
    } else {
        (
            format!(
                "Write '{}' ({}) in Latin letters:",
                word.tamil_word,
                word.primary_meaning()
            ),
            word.transliteration.clone(),
        )
    };

    NewQuestion {
        word_id: word.id.clone(),
        question_type: QuestionType::FillBlank,
        question_text,
        correct_answer,
        answer_options: Vec::new(),
        explanation: explanation(word),
    }
}

fn explanation(word: &Word) -> String {
    let mut text = format!(
        "{} ({}) means \"{}\".",
        word.tamil_word,
        word.transliteration,
        word.meanings.join(", ")
    );
    if !word.example_tamil.is_empty() && !word.example_english.is_empty() {
        text.push_str(&format!(
            " Example: {} ({})",
            word.example_tamil, word.example_english
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn word(id: &str, tamil: &str, translit: &str, meaning: &str) -> Word {
        Word {
            id: id.into(),
            tamil_word: tamil.into(),
            transliteration: translit.into(),
            meanings: vec![meaning.into()],
            example_tamil: String::new(),
            example_english: String::new(),
            audio_url: None,
            category: "general".into(),
            difficulty: 1,
            frequency_rank: None,
        }
    }

    fn pool() -> Vec<Word> {
        vec![
            word("w1", "அன்பு", "anbu", "love"),
            word("w2", "நன்றி", "nandri", "thank you"),
            word("w3", "வீடு", "veedu", "house"),
            word("w4", "தண்ணீர்", "thanneer", "water"),
            word("w5", "புத்தகம்", "puthagam", "book"),
        ]
    }

    #[test]
    fn mcq_has_four_distinct_options_including_answer() {
        let words = pool();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let q = generate_question(&words[0], &words, QuestionType::Mcq, &mut rng);
            assert_eq!(q.answer_options.len(), MCQ_OPTION_COUNT);
            assert!(q.answer_options.contains(&q.correct_answer));
            let mut unique = q.answer_options.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), MCQ_OPTION_COUNT);
        }
    }

    #[test]
    fn mcq_pads_when_pool_is_small() {
        let words = pool();
        let mut rng = StdRng::seed_from_u64(1);
        let q = generate_question(&words[0], &words[..2], QuestionType::Mcq, &mut rng);
        assert_eq!(q.answer_options.len(), MCQ_OPTION_COUNT);
        assert!(q.answer_options.iter().any(|o| o.starts_with("Option ")));
    }

    #[test]
    fn match_is_generated_as_mcq() {
        let words = pool();
        let mut rng = StdRng::seed_from_u64(3);
        let q = generate_question(&words[1], &words, QuestionType::Match, &mut rng);
        assert_eq!(q.question_type, QuestionType::Mcq);
    }

    #[test]
    fn fill_blank_uses_example_when_it_contains_the_word() {
        let mut w = word("w1", "அன்பு", "anbu", "love");
        w.example_tamil = "அம்மாவின் அன்பு பெரியது".into();
        w.example_english = "Mother's love is great".into();
        let mut rng = StdRng::seed_from_u64(0);
        let q = generate_question(&w, &[], QuestionType::FillBlank, &mut rng);
        assert_eq!(q.question_text, "Complete: அம்மாவின் ____ பெரியது");
        assert_eq!(q.correct_answer, "அன்பு");
    }

    #[test]
    fn fill_blank_falls_back_to_transliteration() {
        let w = word("w3", "வீடு", "veedu", "house");
        let mut rng = StdRng::seed_from_u64(0);
        let q = generate_question(&w, &[], QuestionType::FillBlank, &mut rng);
        assert_eq!(q.correct_answer, "veedu");
        assert!(q.question_text.contains("வீடு"));
    }

    #[test]
    fn types_are_drawn_from_the_requested_list() {
        let words = pool();
        let mut rng = StdRng::seed_from_u64(11);
        let requested = [QuestionType::Audio, QuestionType::Typing];
        let questions = generate_questions(&words, &words, &requested, &mut rng);
        assert_eq!(questions.len(), words.len());
        for (question, word) in questions.iter().zip(&words) {
            assert!(requested.contains(&question.question_type));
            assert_eq!(question.word_id, word.id);
            assert_eq!(question.correct_answer, word.tamil_word);
        }
    }

    #[test]
    fn typing_asks_for_the_tamil_word() {
        let words = pool();
        let questions = generate_questions(
            &words[1..2],
            &words,
            &[QuestionType::Typing],
            &mut StdRng::seed_from_u64(2),
        );
        assert_eq!(questions[0].question_text, "Type the Tamil word for: thank you");
    }

    #[test]
    fn empty_type_list_uses_defaults() {
        let words = pool();
        let questions = generate_questions(&words, &words, &[], &mut StdRng::seed_from_u64(5));
        assert!(questions
            .iter()
            .all(|q| QuestionType::DEFAULTS.contains(&q.question_type)));
    }
}
