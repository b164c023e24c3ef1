use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::protocol::Question;

mod bank;

pub use bank::StaticQuestionBank;

/// One raw item from the question source: correct answer separated from the
/// distractors, options not yet shuffled.
#[derive(Debug, Clone)]
pub struct RawQuestion {
    pub text: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub category: String,
    pub difficulty: String,
}

#[derive(Debug, Error)]
pub enum QuestionSourceError {
    #[error("question source returned {returned} questions, {requested} requested")]
    NotEnough { requested: usize, returned: usize },
    #[error("question source unavailable: {0}")]
    Unavailable(String),
}

/// Trivia provider abstraction. Implementations fetch a batch of raw
/// question items; the engine owns shuffling and persistence.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch exactly `count` questions. Returning fewer is an error the
    /// engine surfaces as `not-enough-questions`.
    async fn fetch(&self, count: usize) -> Result<Vec<RawQuestion>, QuestionSourceError>;
}

/// Turn a raw item into a persisted question: shuffle the four options with
/// a uniform Fisher–Yates pass and record where the correct answer landed.
/// `index` becomes the question's stringified id.
pub fn prepare_question(index: usize, raw: &RawQuestion) -> Question {
    let mut rng = rand::rng();
    let mut options: Vec<String> = Vec::with_capacity(1 + raw.incorrect_answers.len());
    options.push(raw.correct_answer.clone());
    options.extend(raw.incorrect_answers.iter().cloned());
    options.shuffle(&mut rng);

    let correct_index = options
        .iter()
        .position(|option| option == &raw.correct_answer)
        .unwrap_or(0) as u8;

    Question {
        id: index.to_string(),
        text: raw.text.clone(),
        options,
        correct_index,
        category: raw.category.clone(),
        difficulty: raw.difficulty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn raw() -> RawQuestion {
        RawQuestion {
            text: "Largest planet?".into(),
            correct_answer: "Jupiter".into(),
            incorrect_answers: vec!["Mars".into(), "Venus".into(), "Saturn".into()],
            category: "Science".into(),
            difficulty: "easy".into(),
        }
    }

    #[test]
    fn prepared_question_keeps_all_options_and_points_at_correct() {
        for index in 0..50 {
            let question = prepare_question(index, &raw());
            assert_eq!(question.id, index.to_string());
            assert_eq!(question.options.len(), 4);
            let unique: HashSet<&String> = question.options.iter().collect();
            assert_eq!(unique.len(), 4);
            assert_eq!(
                question.options[question.correct_index as usize],
                "Jupiter"
            );
        }
    }

    #[test]
    fn shuffle_moves_the_correct_answer_around() {
        // 200 shuffles of 4 options leaving the correct answer in slot 0
        // every time has probability 0.25^200.
        let positions: HashSet<u8> = (0..200)
            .map(|_| prepare_question(0, &raw()).correct_index)
            .collect();
        assert!(positions.len() > 1, "shuffle never moved the answer");
    }
}
