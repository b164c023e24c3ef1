use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{QuestionSource, QuestionSourceError, RawQuestion};

/// Built-in question bank used in development and tests. Cycles through a
/// fixed set of general-knowledge items so any batch size can be served.
pub struct StaticQuestionBank {
    items: Vec<RawQuestion>,
    cursor: AtomicUsize,
}

impl StaticQuestionBank {
    pub fn new() -> Self {
        Self {
            items: builtin_items(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// A bank over caller-supplied items, for tests that need fixed answers.
    pub fn with_items(items: Vec<RawQuestion>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for StaticQuestionBank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionBank {
    async fn fetch(&self, count: usize) -> Result<Vec<RawQuestion>, QuestionSourceError> {
        if self.items.is_empty() {
            return Err(QuestionSourceError::NotEnough {
                requested: count,
                returned: 0,
            });
        }

        let start = self.cursor.fetch_add(count, Ordering::Relaxed);
        let batch = (0..count)
            .map(|offset| self.items[(start + offset) % self.items.len()].clone())
            .collect();
        Ok(batch)
    }
}

fn item(
    text: &str,
    correct: &str,
    incorrect: [&str; 3],
    category: &str,
    difficulty: &str,
) -> RawQuestion {
    RawQuestion {
        text: text.to_string(),
        correct_answer: correct.to_string(),
        incorrect_answers: incorrect.iter().map(|s| s.to_string()).collect(),
        category: category.to_string(),
        difficulty: difficulty.to_string(),
    }
}

fn builtin_items() -> Vec<RawQuestion> {
    vec![
        item(
            "What is the capital of Australia?",
            "Canberra",
            ["Sydney", "Melbourne", "Perth"],
            "Geography",
            "easy",
        ),
        item(
            "Which planet has the most moons?",
            "Saturn",
            ["Jupiter", "Uranus", "Neptune"],
            "Science",
            "medium",
        ),
        item(
            "Who painted the Mona Lisa?",
            "Leonardo da Vinci",
            ["Michelangelo", "Raphael", "Donatello"],
            "Art",
            "easy",
        ),
        item(
            "What year did the Berlin Wall fall?",
            "1989",
            ["1987", "1991", "1993"],
            "History",
            "medium",
        ),
        item(
            "Which element has the chemical symbol Au?",
            "Gold",
            ["Silver", "Copper", "Aluminium"],
            "Science",
            "easy",
        ),
        item(
            "What is the longest river in the world?",
            "The Nile",
            ["The Amazon", "The Yangtze", "The Mississippi"],
            "Geography",
            "medium",
        ),
        item(
            "Who wrote the novel 1984?",
            "George Orwell",
            ["Aldous Huxley", "Ray Bradbury", "J.D. Salinger"],
            "Literature",
            "easy",
        ),
        item(
            "How many keys does a standard piano have?",
            "88",
            ["76", "96", "104"],
            "Music",
            "medium",
        ),
        item(
            "Which country hosted the 2016 Summer Olympics?",
            "Brazil",
            ["China", "United Kingdom", "Japan"],
            "Sport",
            "easy",
        ),
        item(
            "What is the smallest prime number?",
            "2",
            ["1", "3", "0"],
            "Mathematics",
            "easy",
        ),
        item(
            "In computing, what does CPU stand for?",
            "Central Processing Unit",
            [
                "Computer Personal Unit",
                "Central Program Utility",
                "Core Processing Unit",
            ],
            "Technology",
            "easy",
        ),
        item(
            "Which gas makes up most of Earth's atmosphere?",
            "Nitrogen",
            ["Oxygen", "Carbon dioxide", "Argon"],
            "Science",
            "medium",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bank_serves_any_batch_size() {
        let bank = StaticQuestionBank::new();
        let batch = bank.fetch(40).await.unwrap();
        assert_eq!(batch.len(), 40);
    }

    #[tokio::test]
    async fn empty_bank_reports_not_enough() {
        let bank = StaticQuestionBank::with_items(Vec::new());
        let err = bank.fetch(4).await.unwrap_err();
        assert!(matches!(
            err,
            QuestionSourceError::NotEnough {
                requested: 4,
                returned: 0
            }
        ));
    }
}
