//! Persona records used by the chatbot prototype.
//!
//! These are plain data holders: every field is optional or an append-only
//! list, and [`summary`](Person::summary) returns a flat snapshot of the
//! current values keyed by field name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Summary = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub notes: Vec<String>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_occupation(mut self, occupation: impl Into<String>) -> Self {
        self.occupation = Some(occupation.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::new();
        summary.insert("name".into(), optional(&self.name));
        summary.insert("age".into(), self.age.map(Value::from).unwrap_or(Value::Null));
        summary.insert("gender".into(), optional(&self.gender));
        summary.insert("occupation".into(), optional(&self.occupation));
        summary.insert("location".into(), optional(&self.location));
        summary.insert("notes".into(), list(&self.notes));
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(flatten)]
    pub person: Person,
    pub symptoms: Vec<String>,
    pub diagnosis: Option<String>,
    pub medications: Vec<String>,
    pub history: Vec<String>,
    pub goals: Vec<String>,
    /// Name of the assigned therapist
    pub therapist: Option<String>,
}

impl Patient {
    pub fn new(person: Person) -> Self {
        Self {
            person,
            ..Self::default()
        }
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.person.add_note(note);
    }

    pub fn add_symptom(&mut self, symptom: impl Into<String>) {
        self.symptoms.push(symptom.into());
    }

    pub fn set_diagnosis(&mut self, diagnosis: impl Into<String>) {
        self.diagnosis = Some(diagnosis.into());
    }

    pub fn add_medication(&mut self, medication: impl Into<String>) {
        self.medications.push(medication.into());
    }

    pub fn add_history(&mut self, event: impl Into<String>) {
        self.history.push(event.into());
    }

    pub fn add_goal(&mut self, goal: impl Into<String>) {
        self.goals.push(goal.into());
    }

    pub fn set_therapist(&mut self, therapist_name: impl Into<String>) {
        self.therapist = Some(therapist_name.into());
    }

    /// Person fields followed by the clinical ones.
    pub fn summary(&self) -> Summary {
        let mut summary = self.person.summary();
        summary.insert("symptoms".into(), list(&self.symptoms));
        summary.insert("diagnosis".into(), optional(&self.diagnosis));
        summary.insert("medications".into(), list(&self.medications));
        summary.insert("history".into(), list(&self.history));
        summary.insert("goals".into(), list(&self.goals));
        summary.insert("therapist".into(), optional(&self.therapist));
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapist {
    #[serde(flatten)]
    pub person: Person,
    pub specialties: Vec<String>,
    pub therapeutic_approach: Option<String>,
    pub license: Option<String>,
    pub experience_years: Option<u32>,
    /// Names of the patients in this therapist's care
    pub patients: Vec<String>,
}

impl Therapist {
    pub fn new(person: Person) -> Self {
        Self {
            person,
            ..Self::default()
        }
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.person.add_note(note);
    }

    pub fn add_specialty(&mut self, specialty: impl Into<String>) {
        self.specialties.push(specialty.into());
    }

    pub fn set_approach(&mut self, approach: impl Into<String>) {
        self.therapeutic_approach = Some(approach.into());
    }

    pub fn set_license(&mut self, license: impl Into<String>) {
        self.license = Some(license.into());
    }

    pub fn set_experience_years(&mut self, years: u32) {
        self.experience_years = Some(years);
    }

    pub fn add_patient(&mut self, patient_name: impl Into<String>) {
        self.patients.push(patient_name.into());
    }

    pub fn summary(&self) -> Summary {
        let mut summary = self.person.summary();
        summary.insert("specialties".into(), list(&self.specialties));
        summary.insert("therapeutic_approach".into(), optional(&self.therapeutic_approach));
        summary.insert("license".into(), optional(&self.license));
        summary.insert(
            "experience_years".into(),
            self.experience_years.map(Value::from).unwrap_or(Value::Null),
        );
        summary.insert("patients".into(), list(&self.patients));
        summary
    }
}

fn optional(value: &Option<String>) -> Value {
    value.as_deref().map(Value::from).unwrap_or(Value::Null)
}

fn list(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_person_summary() {
        let mut person = Person::new("Sam").with_age(34).with_location("Leeds");
        person.add_note("prefers evening sessions");

        let summary = person.summary();
        assert_eq!(summary["name"], json!("Sam"));
        assert_eq!(summary["age"], json!(34));
        assert_eq!(summary["gender"], Value::Null);
        assert_eq!(summary["location"], json!("Leeds"));
        assert_eq!(summary["notes"], json!(["prefers evening sessions"]));
        assert_eq!(summary.len(), 6);
    }

    #[test]
    fn test_patient_helpers() {
        let mut patient = Patient::new(Person::new("Jordan"));
        patient.add_symptom("insomnia");
        patient.add_symptom("low mood");
        patient.set_diagnosis("generalized anxiety");
        patient.add_medication("sertraline");
        patient.add_history("first session in March");
        patient.add_goal("sleep through the night");
        patient.set_therapist("Dr. Rivera");
        patient.add_note("referred by GP");

        let summary = patient.summary();
        assert_eq!(summary["name"], json!("Jordan"));
        assert_eq!(summary["symptoms"], json!(["insomnia", "low mood"]));
        assert_eq!(summary["diagnosis"], json!("generalized anxiety"));
        assert_eq!(summary["goals"], json!(["sleep through the night"]));
        assert_eq!(summary["therapist"], json!("Dr. Rivera"));
        assert_eq!(summary["notes"], json!(["referred by GP"]));
        assert_eq!(summary.len(), 12);
    }

    #[test]
    fn test_therapist_helpers() {
        let mut therapist = Therapist::new(Person::new("Dr. Rivera").with_occupation("psychologist"));
        therapist.add_specialty("anxiety");
        therapist.set_approach("CBT");
        therapist.set_license("PSY-12345");
        therapist.set_experience_years(12);
        therapist.add_patient("Jordan");

        let summary = therapist.summary();
        assert_eq!(summary["occupation"], json!("psychologist"));
        assert_eq!(summary["specialties"], json!(["anxiety"]));
        assert_eq!(summary["therapeutic_approach"], json!("CBT"));
        assert_eq!(summary["license"], json!("PSY-12345"));
        assert_eq!(summary["experience_years"], json!(12));
        assert_eq!(summary["patients"], json!(["Jordan"]));
    }

    #[test]
    fn test_empty_summary_has_nulls() {
        let summary = Therapist::default().summary();
        assert_eq!(summary["name"], Value::Null);
        assert_eq!(summary["license"], Value::Null);
        assert_eq!(summary["patients"], json!([]));
    }
}
