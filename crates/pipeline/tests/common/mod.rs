//! Shared fixtures for pipeline integration tests: an in-memory store and
//! a scripted character library that records every call.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use nm_core::prompt::CharacterProfile;
use nm_core::types::DbId;
use nm_db::memory::InMemoryStore;
use nm_db::models::character::{Character, CreateCharacter};
use nm_db::models::character_reference::{CharacterReference, CreateCharacterReference};
use nm_library::messages::{
    ConsistencyReport, GeneratedImage, ProjectConsistencyRequest, RemoteCharacter,
    RemoteCharacterPayload, SceneImageRequest, SmartImageRequest, TurnaroundRequest,
};
use nm_library::{CharacterLibrary, HealthMonitor, LibraryApiError, LibraryConfig};
use nm_pipeline::{CharacterLibraryService, PipelineSettings};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Scripted library
// ---------------------------------------------------------------------------

/// A remote call as observed by [`ScriptedLibrary`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(String),
    Find(String),
    Delete(String),
    Initial(String),
    Smart(String),
    CoreSet(String),
    Turnaround(String),
    Scene(String),
    Validate(String, String),
    Query(String),
    ProjectConsistency(String),
}

/// Scripted responses. Queues are consumed front-first; an empty queue
/// falls back to a passing default.
#[derive(Default)]
pub struct Script {
    /// Character names whose create call fails with a 422.
    pub fail_create_for: HashSet<String>,
    pub deletes: VecDeque<Result<(), LibraryApiError>>,
    pub initial: VecDeque<Result<GeneratedImage, LibraryApiError>>,
    /// Status every initial-image call fails with.
    pub initial_always_fails: Option<u16>,
    pub smart_always_fails: Option<u16>,
    pub core_sets: VecDeque<Result<Vec<GeneratedImage>, LibraryApiError>>,
    pub turnarounds: VecDeque<Result<Vec<GeneratedImage>, LibraryApiError>>,
    /// Last initial-image prompt received.
    pub last_initial_prompt: Option<String>,
    pub validations: VecDeque<Result<ConsistencyReport, LibraryApiError>>,
    pub calls: Vec<Call>,
    created: u32,
    generated: u32,
}

#[derive(Default)]
pub struct ScriptedLibrary {
    script: Mutex<Script>,
}

impl ScriptedLibrary {
    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.script().calls.iter().filter(|c| pred(c)).count()
    }
}

impl Script {
    fn next_image(&mut self) -> GeneratedImage {
        self.generated += 1;
        image(&format!("img-{}", self.generated), 90.0)
    }
}

#[async_trait]
impl CharacterLibrary for ScriptedLibrary {
    async fn create_character(
        &self,
        payload: &RemoteCharacterPayload,
    ) -> Result<RemoteCharacter, LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::Create(payload.name.clone()));
        if script.fail_create_for.contains(&payload.name) {
            return Err(api_error(422));
        }
        script.created += 1;
        Ok(RemoteCharacter {
            remote_id: format!("rc-{}", script.created),
            character_id: Some(payload.character_id.clone()),
        })
    }

    async fn find_character(&self, remote_id: &str) -> Result<Option<Value>, LibraryApiError> {
        self.script().calls.push(Call::Find(remote_id.to_string()));
        Ok(None)
    }

    async fn delete_character(&self, remote_id: &str) -> Result<(), LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::Delete(remote_id.to_string()));
        script.deletes.pop_front().unwrap_or(Ok(()))
    }

    async fn generate_initial_image(
        &self,
        remote_id: &str,
        prompt: &str,
    ) -> Result<GeneratedImage, LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::Initial(remote_id.to_string()));
        script.last_initial_prompt = Some(prompt.to_string());
        if let Some(status) = script.initial_always_fails {
            return Err(api_error(status));
        }
        match script.initial.pop_front() {
            Some(scripted) => scripted,
            None => Ok(script.next_image()),
        }
    }

    async fn generate_smart_image(
        &self,
        remote_id: &str,
        _request: &SmartImageRequest,
    ) -> Result<GeneratedImage, LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::Smart(remote_id.to_string()));
        if let Some(status) = script.smart_always_fails {
            return Err(api_error(status));
        }
        Ok(script.next_image())
    }

    async fn generate_core_set(
        &self,
        remote_id: &str,
    ) -> Result<Vec<GeneratedImage>, LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::CoreSet(remote_id.to_string()));
        match script.core_sets.pop_front() {
            Some(scripted) => scripted,
            None => Ok(vec![script.next_image(), script.next_image()]),
        }
    }

    async fn generate_360_set(
        &self,
        remote_id: &str,
        _request: &TurnaroundRequest,
    ) -> Result<Vec<GeneratedImage>, LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::Turnaround(remote_id.to_string()));
        match script.turnarounds.pop_front() {
            Some(scripted) => scripted,
            None => Ok((0..3).map(|_| script.next_image()).collect()),
        }
    }

    async fn generate_scene_image(
        &self,
        remote_id: &str,
        _request: &SceneImageRequest,
    ) -> Result<GeneratedImage, LibraryApiError> {
        let mut script = self.script();
        script.calls.push(Call::Scene(remote_id.to_string()));
        Ok(script.next_image())
    }

    async fn validate_consistency(
        &self,
        remote_id: &str,
        image_id: &str,
    ) -> Result<ConsistencyReport, LibraryApiError> {
        let mut script = self.script();
        script
            .calls
            .push(Call::Validate(remote_id.to_string(), image_id.to_string()));
        script
            .validations
            .pop_front()
            .unwrap_or_else(|| Ok(report(95.0, None)))
    }

    async fn query_characters(&self, query: &str) -> Result<Value, LibraryApiError> {
        self.script().calls.push(Call::Query(query.to_string()));
        Ok(Value::Array(Vec::new()))
    }

    async fn validate_project_consistency(
        &self,
        request: &ProjectConsistencyRequest,
    ) -> Result<Value, LibraryApiError> {
        self.script()
            .calls
            .push(Call::ProjectConsistency(request.project_id.clone()));
        Ok(json!({ "overallScore": 90, "consistencyThreshold": request.consistency_threshold }))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn api_error(status: u16) -> LibraryApiError {
    LibraryApiError::Api {
        status,
        body: "boom".to_string(),
    }
}

pub fn image(id: &str, quality: f64) -> GeneratedImage {
    GeneratedImage {
        image_id: id.to_string(),
        url: Some(format!("https://cdn.example/{id}.png")),
        quality_score: Some(quality),
        consistency_score: None,
    }
}

pub fn report(consistency: f64, quality: Option<f64>) -> ConsistencyReport {
    ConsistencyReport {
        consistency_score: Some(consistency),
        quality_score: quality,
        is_consistent: None,
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub library: Arc<ScriptedLibrary>,
    pub service: CharacterLibraryService,
}

pub fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let library = Arc::new(ScriptedLibrary::default());
    // Points at a closed port; only probed by the health test.
    let health = HealthMonitor::new(&LibraryConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        health_timeout: Duration::from_millis(200),
        ..LibraryConfig::default()
    });
    let service = CharacterLibraryService::new(
        store.clone(),
        store.clone(),
        library.clone(),
        health,
        PipelineSettings::immediate(),
    );
    Fixture {
        store,
        library,
        service,
    }
}

/// Seed a character with a reference carrying a small profile.
pub async fn seed_character(
    store: &InMemoryStore,
    project_id: DbId,
    name: &str,
) -> (Character, CharacterReference) {
    let character = store
        .insert_character(CreateCharacter {
            project_id,
            name: name.to_string(),
            role: None,
        })
        .await;
    let profile = CharacterProfile {
        gender: Some("woman".into()),
        age: Some(34),
        wardrobe: Some("weathered trench coat".into()),
        ..Default::default()
    };
    let reference = store
        .insert_reference(CreateCharacterReference {
            character_id: Some(character.id),
            project_id,
            name: name.to_string(),
            profile,
        })
        .await;
    (character, reference)
}
