//! Scripted extractor and recording sleeper shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::ExtractError;
use crate::extract::Extract;
use crate::formats::RecipeRecord;
use crate::retry::Sleeper;

pub(crate) fn sample_record(url: &str, title: &str) -> RecipeRecord {
    RecipeRecord {
        title: title.to_owned(),
        ingredients: vec!["1 cup flour".to_owned(), "1 tsp salt".to_owned()],
        instructions: vec!["Mix.".to_owned(), "Bake.".to_owned()],
        image_url: None,
        source_url: url.to_owned(),
        description: None,
        prep_time: None,
        cook_time: None,
        total_time: None,
        servings: None,
        image: None,
        image_error: None,
    }
}

/// Replays scripted results per URL; once a script runs out the last result repeats.
#[derive(Default)]
pub(crate) struct ScriptedExtractor {
    scripts: RefCell<HashMap<String, VecDeque<Result<RecipeRecord, ExtractError>>>>,
    last: RefCell<HashMap<String, Result<RecipeRecord, ExtractError>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedExtractor {
    pub(crate) fn script(
        self,
        url: &str,
        results: impl IntoIterator<Item = Result<RecipeRecord, ExtractError>>,
    ) -> Self {
        self.scripts
            .borrow_mut()
            .insert(url.to_owned(), results.into_iter().collect());
        self
    }

    pub(crate) fn succeed(self, url: &str, title: &str) -> Self {
        let record = sample_record(url, title);
        self.script(url, [Ok(record)])
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|u| u.as_str() == url).count()
    }
}

impl Extract for ScriptedExtractor {
    fn extract(&self, url: &str) -> Result<RecipeRecord, ExtractError> {
        self.calls.borrow_mut().push(url.to_owned());

        let next = self
            .scripts
            .borrow_mut()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        match next {
            Some(result) => {
                self.last.borrow_mut().insert(url.to_owned(), result.clone());
                result
            }
            None => self
                .last
                .borrow()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(ExtractError::unsupported("not scripted"))),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}
