//! In-process fact store for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::FactStore;
use crate::domain::{Answer, ExtractedFacts, Lv, Project, Question, TradeAssignment};
use crate::error::{PipelineError, PipelineResult};

type Key = (Uuid, String);

fn key(project_id: Uuid, trade: &str) -> Key {
    (project_id, trade.to_string())
}

#[derive(Default)]
struct Inner {
    projects: HashMap<Uuid, Project>,
    trades: HashMap<Uuid, Vec<TradeAssignment>>,
    questions: HashMap<Key, Vec<Question>>,
    answers: HashMap<Key, Vec<Answer>>,
    lvs: HashMap<Key, Lv>,
}

#[derive(Default)]
pub struct MemoryFactStore {
    inner: RwLock<Inner>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for MemoryFactStore {
    async fn create_project(&self, project: &Project) -> PipelineResult<()> {
        self.inner
            .write()
            .projects
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn project(&self, project_id: Uuid) -> PipelineResult<Option<Project>> {
        Ok(self.inner.read().projects.get(&project_id).cloned())
    }

    async fn update_extracted_facts(
        &self,
        project_id: Uuid,
        facts: &ExtractedFacts,
    ) -> PipelineResult<()> {
        let mut inner = self.inner.write();
        let project = inner
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| PipelineError::not_found(format!("project {project_id}")))?;
        project.extracted_facts = facts.clone();
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn assign_trades(
        &self,
        project_id: Uuid,
        assignments: &[TradeAssignment],
    ) -> PipelineResult<Vec<TradeAssignment>> {
        let mut inner = self.inner.write();
        let current = inner.trades.entry(project_id).or_default();
        for assignment in assignments {
            if !current.iter().any(|a| a.trade_code == assignment.trade_code) {
                current.push(assignment.clone());
            }
        }
        Ok(current.clone())
    }

    async fn trade_assignments(&self, project_id: Uuid) -> PipelineResult<Vec<TradeAssignment>> {
        Ok(self
            .inner
            .read()
            .trades
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn questions(&self, project_id: Uuid, trade: &str) -> PipelineResult<Vec<Question>> {
        Ok(self
            .inner
            .read()
            .questions
            .get(&key(project_id, trade))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_questions(
        &self,
        project_id: Uuid,
        trade: &str,
        questions: &[Question],
    ) -> PipelineResult<()> {
        let k = key(project_id, trade);
        let mut inner = self.inner.write();

        let answered: HashSet<String> = inner
            .answers
            .get(&k)
            .map(|answers| answers.iter().map(|a| a.question_id.clone()).collect())
            .unwrap_or_default();
        let new_ids: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();

        let mut merged: Vec<Question> = inner
            .questions
            .remove(&k)
            .unwrap_or_default()
            .into_iter()
            .filter(|old| !new_ids.contains(old.id.as_str()) && answered.contains(&old.id))
            .collect();
        merged.extend(questions.iter().cloned());
        merged.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

        inner.questions.insert(k, merged);
        Ok(())
    }

    async fn answers(&self, project_id: Uuid, trade: &str) -> PipelineResult<Vec<Answer>> {
        Ok(self
            .inner
            .read()
            .answers
            .get(&key(project_id, trade))
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_answers(
        &self,
        project_id: Uuid,
        trade: &str,
        answers: &[Answer],
    ) -> PipelineResult<()> {
        let k = key(project_id, trade);
        let mut inner = self.inner.write();

        let known: HashSet<&str> = inner
            .questions
            .get(&k)
            .map(|qs| qs.iter().map(|q| q.id.as_str()).collect())
            .unwrap_or_default();
        if let Some(unknown) = answers
            .iter()
            .find(|a| !known.contains(a.question_id.as_str()))
        {
            return Err(PipelineError::not_found(format!(
                "question {} for trade {trade}",
                unknown.question_id
            )));
        }

        let stored = inner.answers.entry(k).or_default();
        for answer in answers {
            match stored.iter_mut().find(|a| a.question_id == answer.question_id) {
                Some(existing) => *existing = answer.clone(),
                None => stored.push(answer.clone()),
            }
        }
        Ok(())
    }

    async fn lv(&self, project_id: Uuid, trade: &str) -> PipelineResult<Option<Lv>> {
        Ok(self.inner.read().lvs.get(&key(project_id, trade)).cloned())
    }

    async fn save_lv(&self, lv: &Lv) -> PipelineResult<()> {
        self.inner
            .write()
            .lvs
            .insert(key(lv.project_id, &lv.trade_code), lv.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Provenance, QuestionOrigin, QuestionType};

    fn question(project_id: Uuid, id: &str, position: u32) -> Question {
        Question {
            id: id.to_string(),
            project_id,
            trade_code: "FLI".into(),
            position,
            text: format!("Frage {id}"),
            kind: QuestionType::Text,
            required: true,
            options: vec![],
            unit: None,
            depends_on: None,
            show_if: None,
            origin: QuestionOrigin::Drafted,
        }
    }

    fn answer(project_id: Uuid, question_id: &str, text: &str) -> Answer {
        Answer {
            project_id,
            trade_code: "FLI".into(),
            question_id: question_id.into(),
            answer: text.into(),
            assumption: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn replacing_questions_keeps_answered_ones() {
        let store = MemoryFactStore::new();
        let p = Uuid::new_v4();
        store
            .replace_questions(p, "FLI", &[question(p, "FLI-01", 1), question(p, "FLI-02", 2), question(p, "FLI-03", 3)])
            .await
            .unwrap();
        store
            .upsert_answers(p, "FLI", &[answer(p, "FLI-03", "weiß")])
            .await
            .unwrap();

        store
            .replace_questions(p, "FLI", &[question(p, "FLI-01", 1)])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .questions(p, "FLI")
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec!["FLI-01", "FLI-03"]);
    }

    #[tokio::test]
    async fn replacing_twice_does_not_duplicate() {
        let store = MemoryFactStore::new();
        let p = Uuid::new_v4();
        let set = [question(p, "FLI-01", 1), question(p, "FLI-02", 2)];
        store.replace_questions(p, "FLI", &set).await.unwrap();
        store.replace_questions(p, "FLI", &set).await.unwrap();
        assert_eq!(store.questions(p, "FLI").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn answer_batch_is_all_or_nothing() {
        let store = MemoryFactStore::new();
        let p = Uuid::new_v4();
        store
            .replace_questions(p, "FLI", &[question(p, "FLI-01", 1)])
            .await
            .unwrap();

        let err = store
            .upsert_answers(p, "FLI", &[answer(p, "FLI-01", "8"), answer(p, "FLI-09", "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
        assert!(store.answers(p, "FLI").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resaving_an_answer_overwrites() {
        let store = MemoryFactStore::new();
        let p = Uuid::new_v4();
        store
            .replace_questions(p, "FLI", &[question(p, "FLI-01", 1)])
            .await
            .unwrap();
        store.upsert_answers(p, "FLI", &[answer(p, "FLI-01", "8")]).await.unwrap();
        store.upsert_answers(p, "FLI", &[answer(p, "FLI-01", "10")]).await.unwrap();

        let answers = store.answers(p, "FLI").await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].answer, "10");
    }

    #[tokio::test]
    async fn provenance_is_immutable() {
        let store = MemoryFactStore::new();
        let p = Uuid::new_v4();
        let assign = |provenance| TradeAssignment {
            project_id: p,
            trade_code: "ELEKT".into(),
            provenance,
            confidence: None,
            created_at: Utc::now(),
        };
        store.assign_trades(p, &[assign(Provenance::Manual)]).await.unwrap();
        let all = store
            .assign_trades(p, &[assign(Provenance::Detected)])
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].provenance, Provenance::Manual);
    }

    #[tokio::test]
    async fn re_extraction_of_unknown_project_is_not_found() {
        let store = MemoryFactStore::new();
        let err = store
            .update_extracted_facts(Uuid::new_v4(), &ExtractedFacts::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
