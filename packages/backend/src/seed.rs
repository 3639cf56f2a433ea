use crate::cache::keys::ACHIEVEMENT_CATALOG_KEY;
use crate::cache::RedisCache;
use crate::db::operations::gamification::{upsert_achievement, AchievementSeed, CriteriaType};
use crate::db::operations::word::{insert_word, NewWord};
use crate::db::Database;

const DEFAULT_ACHIEVEMENTS: [AchievementSeed; 8] = [
    AchievementSeed {
        name: "First Steps",
        description: "Learn your first 5 words",
        icon: "🎯",
        category: "learning",
        criteria_type: CriteriaType::WordsLearned,
        criteria_value: 5,
        criteria_category: None,
        xp_reward: 50,
        badge_color: "bronze",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Word Explorer",
        description: "Learn 25 words",
        icon: "🗺️",
        category: "learning",
        criteria_type: CriteriaType::WordsLearned,
        criteria_value: 25,
        criteria_category: None,
        xp_reward: 100,
        badge_color: "silver",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Vocabulary Master",
        description: "Learn 100 words",
        icon: "👑",
        category: "learning",
        criteria_type: CriteriaType::WordsLearned,
        criteria_value: 100,
        criteria_category: None,
        xp_reward: 250,
        badge_color: "gold",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Streak Starter",
        description: "Maintain a 3-day learning streak",
        icon: "🔥",
        category: "streak",
        criteria_type: CriteriaType::Streak,
        criteria_value: 3,
        criteria_category: None,
        xp_reward: 75,
        badge_color: "orange",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Dedicated Learner",
        description: "Maintain a 7-day learning streak",
        icon: "⚡",
        category: "streak",
        criteria_type: CriteriaType::Streak,
        criteria_value: 7,
        criteria_category: None,
        xp_reward: 150,
        badge_color: "blue",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Quiz Champion",
        description: "Complete 10 quiz sessions",
        icon: "🏆",
        category: "quiz",
        criteria_type: CriteriaType::QuizSessions,
        criteria_value: 10,
        criteria_category: None,
        xp_reward: 100,
        badge_color: "purple",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Accuracy Expert",
        description: "Achieve 90% accuracy",
        icon: "🎯",
        category: "quiz",
        criteria_type: CriteriaType::Accuracy,
        criteria_value: 90,
        criteria_category: None,
        xp_reward: 200,
        badge_color: "green",
        is_hidden: false,
    },
    AchievementSeed {
        name: "Emotion Master",
        description: "Master 10 emotion words",
        icon: "❤️",
        category: "mastery",
        criteria_type: CriteriaType::CategoryMastery,
        criteria_value: 10,
        criteria_category: Some("emotions"),
        xp_reward: 125,
        badge_color: "pink",
        is_hidden: false,
    },
];

struct SampleWord {
    tamil: &'static str,
    transliteration: &'static str,
    meanings: &'static [&'static str],
    example_tamil: &'static str,
    example_english: &'static str,
    category: &'static str,
    difficulty: i64,
}

const SAMPLE_WORDS: [SampleWord; 12] = [
    SampleWord {
        tamil: "அன்பு",
        transliteration: "anbu",
        meanings: &["love", "affection", "kindness"],
        example_tamil: "அன்பு மிகுந்த மனிதர்",
        example_english: "A loving person",
        category: "emotions",
        difficulty: 1,
    },
    SampleWord {
        tamil: "நன்றி",
        transliteration: "nandri",
        meanings: &["thanks", "gratitude"],
        example_tamil: "உங்களுக்கு நன்றி",
        example_english: "Thank you",
        category: "emotions",
        difficulty: 1,
    },
    SampleWord {
        tamil: "வணக்கம்",
        transliteration: "vanakkam",
        meanings: &["hello", "greetings", "namaste"],
        example_tamil: "வணக்கம், எப்படி இருக்கீங்க?",
        example_english: "Hello, how are you?",
        category: "greetings",
        difficulty: 1,
    },
    SampleWord {
        tamil: "புத்தகம்",
        transliteration: "puththagam",
        meanings: &["book"],
        example_tamil: "நான் புத்தகம் படிக்கிறேன்",
        example_english: "I am reading a book",
        category: "education",
        difficulty: 1,
    },
    SampleWord {
        tamil: "பள்ளி",
        transliteration: "palli",
        meanings: &["school"],
        example_tamil: "நான் பள்ளிக்கு போகிறேன்",
        example_english: "I am going to school",
        category: "education",
        difficulty: 1,
    },
    SampleWord {
        tamil: "வீடு",
        transliteration: "veedu",
        meanings: &["house", "home"],
        example_tamil: "என் வீடு பெரியது",
        example_english: "My house is big",
        category: "places",
        difficulty: 1,
    },
    SampleWord {
        tamil: "தண்ணீர்",
        transliteration: "thanneer",
        meanings: &["water"],
        example_tamil: "எனக்கு தண்ணீர் வேண்டும்",
        example_english: "I need water",
        category: "food",
        difficulty: 1,
    },
    SampleWord {
        tamil: "சாப்பாடு",
        transliteration: "saappaadu",
        meanings: &["food", "meal"],
        example_tamil: "சாப்பாடு ருசியாக இருக்கிறது",
        example_english: "The food is tasty",
        category: "food",
        difficulty: 1,
    },
    SampleWord {
        tamil: "நேரம்",
        transliteration: "neram",
        meanings: &["time"],
        example_tamil: "இப்போது என்ன நேரம்?",
        example_english: "What time is it now?",
        category: "time",
        difficulty: 2,
    },
    SampleWord {
        tamil: "பணம்",
        transliteration: "panam",
        meanings: &["money"],
        example_tamil: "என்னிடம் பணம் இல்லை",
        example_english: "I don't have money",
        category: "general",
        difficulty: 2,
    },
    SampleWord {
        tamil: "மகிழ்ச்சி",
        transliteration: "magizhchi",
        meanings: &["happiness", "joy"],
        example_tamil: "அவர் மகிழ்ச்சியாக இருக்கிறார்",
        example_english: "He is happy",
        category: "emotions",
        difficulty: 2,
    },
    SampleWord {
        tamil: "கடினமான",
        transliteration: "kadinamana",
        meanings: &["difficult", "hard"],
        example_tamil: "இது கடினமான கேள்வி",
        example_english: "This is a difficult question",
        category: "adjectives",
        difficulty: 3,
    },
];

/// Inserts the default achievement catalog. Existing names are left untouched.
pub async fn seed_achievements(db: &Database, cache: Option<&RedisCache>) -> Result<usize, sqlx::Error> {
    let mut inserted = 0;
    for seed in &DEFAULT_ACHIEVEMENTS {
        if upsert_achievement(db.pool(), seed).await? {
            inserted += 1;
        }
    }

    if inserted > 0 {
        if let Some(cache) = cache {
            cache.delete(ACHIEVEMENT_CATALOG_KEY).await;
        }
        tracing::info!(inserted, "seeded achievements");
    } else {
        tracing::debug!("achievement catalog already present");
    }
    Ok(inserted)
}

pub async fn seed_sample_words(db: &Database) -> Result<usize, sqlx::Error> {
    let mut inserted = 0;
    for (rank, sample) in SAMPLE_WORDS.iter().enumerate() {
        let word = NewWord {
            tamil_word: sample.tamil.to_string(),
            transliteration: sample.transliteration.to_string(),
            meanings: sample.meanings.iter().map(|m| m.to_string()).collect(),
            example_tamil: sample.example_tamil.to_string(),
            example_english: sample.example_english.to_string(),
            category: sample.category.to_string(),
            difficulty: sample.difficulty,
            frequency_rank: Some(rank as i64 + 1),
        };
        if insert_word(db.pool(), &word).await? {
            inserted += 1;
        }
    }

    if inserted > 0 {
        tracing::info!(inserted, "seeded sample words");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_examples_contain_their_word() {
        for sample in &SAMPLE_WORDS {
            assert!(
                sample.example_tamil.contains(sample.tamil),
                "{} missing from its example",
                sample.transliteration
            );
        }
    }

    #[test]
    fn catalog_names_are_unique() {
        let mut names: Vec<&str> = DEFAULT_ACHIEVEMENTS.iter().map(|a| a.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DEFAULT_ACHIEVEMENTS.len());
    }

    #[test]
    fn category_mastery_names_its_category() {
        for seed in &DEFAULT_ACHIEVEMENTS {
            assert_eq!(
                seed.criteria_type == CriteriaType::CategoryMastery,
                seed.criteria_category.is_some()
            );
        }
    }
}
