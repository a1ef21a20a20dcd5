//! Typed entry points for the built-in advisory flows.
//!
//! Each function takes a plain input struct, runs the flow of the same name
//! through [`FlowExecutor::execute_typed`] and returns the validated output
//! as a struct. Field names serialize in camelCase to match the flow schemas.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::flow::FlowExecutor;

pub const SUGGEST_OPTIMAL_CROPS: &str = "suggestOptimalCrops";
pub const CALCULATE_IRRIGATION_SCHEDULE: &str = "calculateIrrigationSchedule";
pub const PREDICT_YIELD: &str = "predictYield";
pub const FIND_GOVT_SCHEMES: &str = "findGovtSchemes";
pub const GET_MARKET_PRICE: &str = "getMarketPrice";
pub const DIAGNOSE_PLANT: &str = "diagnosePlant";
pub const OPTIMIZE_CROP_ROTATION: &str = "optimizeCropRotation";
pub const ANALYZE_FARM_DATA: &str = "analyzeFarmData";
pub const FARM_ASSISTANT: &str = "farmAssistant";

/// Response language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Kn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Kharif,
    Rabi,
    Zaid,
}

/// Farmer category by land holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FarmerCategory {
    Marginal,
    Small,
    Medium,
    Large,
}

// ── suggestOptimalCrops ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestOptimalCropsInput {
    pub location: String,
    pub soil_type: String,
    pub resources: String,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestOptimalCropsOutput {
    pub crops: Vec<String>,
    pub reasoning: String,
}

pub async fn suggest_optimal_crops(
    executor: &FlowExecutor,
    input: SuggestOptimalCropsInput,
) -> Result<SuggestOptimalCropsOutput, FlowError> {
    executor.execute_typed(SUGGEST_OPTIMAL_CROPS, &input).await
}

// ── calculateIrrigationSchedule ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationScheduleInput {
    pub crop_type: String,
    pub soil_type: String,
    pub location: String,
    pub water_access: String,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationEvent {
    /// `YYYY-MM-DD`
    pub date: String,
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationScheduleOutput {
    pub schedule: Vec<IrrigationEvent>,
    pub water_conservation_tips: String,
}

pub async fn calculate_irrigation_schedule(
    executor: &FlowExecutor,
    input: IrrigationScheduleInput,
) -> Result<IrrigationScheduleOutput, FlowError> {
    executor
        .execute_typed(CALCULATE_IRRIGATION_SCHEDULE, &input)
        .await
}

// ── predictYield ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictYieldInput {
    pub crop_type: String,
    pub soil_type: String,
    pub season: Season,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictYieldOutput {
    pub predicted_yield: String,
    pub factors: String,
    pub recommendations: String,
}

pub async fn predict_yield(
    executor: &FlowExecutor,
    input: PredictYieldInput,
) -> Result<PredictYieldOutput, FlowError> {
    executor.execute_typed(PREDICT_YIELD, &input).await
}

// ── findGovtSchemes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindGovtSchemesInput {
    pub location: String,
    pub farmer_category: FarmerCategory,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovtScheme {
    pub name: String,
    pub eligibility: String,
    pub benefits: String,
    pub documents: String,
    pub application: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindGovtSchemesOutput {
    pub schemes: Vec<GovtScheme>,
}

pub async fn find_govt_schemes(
    executor: &FlowExecutor,
    input: FindGovtSchemesInput,
) -> Result<FindGovtSchemesOutput, FlowError> {
    executor.execute_typed(FIND_GOVT_SCHEMES, &input).await
}

// ── getMarketPrice ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPriceInput {
    pub product_name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPriceOutput {
    pub product_name: String,
    pub location: String,
    pub average_price: String,
    pub market_trends: String,
    pub price_factors: String,
}

pub async fn get_market_price(
    executor: &FlowExecutor,
    input: MarketPriceInput,
) -> Result<MarketPriceOutput, FlowError> {
    executor.execute_typed(GET_MARKET_PRICE, &input).await
}

// ── diagnosePlant ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosePlantInput {
    /// `data:<mimetype>;base64,<payload>`
    pub photo_data_uri: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantIdentification {
    pub is_plant: bool,
    pub common_name: String,
    pub latin_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantDiagnosis {
    pub is_healthy: bool,
    pub disease_or_pest: String,
    pub confidence: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantTreatment {
    pub organic: Vec<String>,
    pub chemical: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosePlantOutput {
    pub identification: PlantIdentification,
    pub diagnosis: PlantDiagnosis,
    pub treatment: PlantTreatment,
    pub prevention: Vec<String>,
}

pub async fn diagnose_plant(
    executor: &FlowExecutor,
    input: DiagnosePlantInput,
) -> Result<DiagnosePlantOutput, FlowError> {
    executor.execute_typed(DIAGNOSE_PLANT, &input).await
}

// ── optimizeCropRotation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRotationInput {
    pub location: String,
    pub soil_type: String,
    pub previous_crop: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationSeason {
    pub season: String,
    pub crop: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRotationOutput {
    pub rotation: Vec<RotationSeason>,
}

pub async fn optimize_crop_rotation(
    executor: &FlowExecutor,
    input: CropRotationInput,
) -> Result<CropRotationOutput, FlowError> {
    executor.execute_typed(OPTIMIZE_CROP_ROTATION, &input).await
}

// ── analyzeFarmData ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFarmDataInput {
    pub file_data_uri: String,
    pub file_name: String,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeFarmDataOutput {
    pub analysis: String,
}

pub async fn analyze_farm_data(
    executor: &FlowExecutor,
    input: AnalyzeFarmDataInput,
) -> Result<AnalyzeFarmDataOutput, FlowError> {
    executor.execute_typed(ANALYZE_FARM_DATA, &input).await
}

// ── farmAssistant ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmAssistantInput {
    pub message: String,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmAssistantOutput {
    pub reply: String,
    pub follow_up_questions: Vec<String>,
}

pub async fn farm_assistant(
    executor: &FlowExecutor,
    input: FarmAssistantInput,
) -> Result<FarmAssistantOutput, FlowError> {
    executor.execute_typed(FARM_ASSISTANT, &input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::flow::FlowRegistry;
    use crate::model::MockModelClient;
    use serde_json::json;

    fn executor(mock: Arc<MockModelClient>) -> FlowExecutor {
        FlowExecutor::new(Arc::new(FlowRegistry::with_builtin_flows().unwrap()), mock)
    }

    #[tokio::test]
    async fn test_predict_yield_typed() {
        let mock = Arc::new(MockModelClient::always(json!({
            "predictedYield": "18-20 quintals per acre",
            "factors": "Timely sowing, irrigation",
            "recommendations": "Use certified seed"
        })));
        let output = predict_yield(
            &executor(mock.clone()),
            PredictYieldInput {
                crop_type: "Wheat".to_string(),
                soil_type: "Alluvial Soil".to_string(),
                season: Season::Rabi,
                location: "Nashik, Maharashtra".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(output.predicted_yield, "18-20 quintals per acre");
        let text = mock.requests()[0].rendered.text();
        assert!(text.contains("Season: Rabi"));
        assert!(text.contains("Crop Type: Wheat"));
    }

    #[tokio::test]
    async fn test_diagnose_plant_nested_output() {
        let mock = Arc::new(MockModelClient::always(json!({
            "identification": { "isPlant": true, "commonName": "Tomato", "latinName": "Solanum lycopersicum" },
            "diagnosis": {
                "isHealthy": false,
                "diseaseOrPest": "Early blight",
                "confidence": "High",
                "description": "Concentric brown spots on lower leaves"
            },
            "treatment": { "organic": ["Neem oil spray"], "chemical": ["Mancozeb"] },
            "prevention": ["Rotate crops", "Avoid overhead watering"]
        })));
        let output = diagnose_plant(
            &executor(mock.clone()),
            DiagnosePlantInput {
                photo_data_uri: "data:image/jpeg;base64,/9j/4AAQ".to_string(),
                description: "brown spots on leaves".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(output.identification.is_plant);
        assert_eq!(output.diagnosis.disease_or_pest, "Early blight");
        assert_eq!(output.prevention.len(), 2);

        let request = &mock.requests()[0];
        assert_eq!(request.rendered.media_parts()[0].mime_type, "image/jpeg");
        assert!(request.rendered.text().contains("[media:0]"));
    }

    #[tokio::test]
    async fn test_farm_assistant_without_context() {
        let mock = Arc::new(MockModelClient::always(json!({
            "reply": "ನಮಸ್ಕಾರ",
            "followUpQuestions": []
        })));
        let output = farm_assistant(
            &executor(mock.clone()),
            FarmAssistantInput {
                message: "When should I sow ragi?".to_string(),
                language: Language::Kn,
                context: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(output.reply, "ನಮಸ್ಕಾರ");
        let text = mock.requests()[0].rendered.text();
        assert!(text.contains("Farmer: When should I sow ragi?"));
        assert!(text.contains("language: kn"));
    }

    #[tokio::test]
    async fn test_irrigation_schedule_shape_enforced() {
        // A prose schedule is rejected rather than coerced into events.
        let mock = Arc::new(MockModelClient::always(json!({
            "schedule": "Water every third day",
            "waterConservationTips": "Mulch"
        })));
        let err = calculate_irrigation_schedule(
            &executor(mock),
            IrrigationScheduleInput {
                crop_type: "Sugarcane".to_string(),
                soil_type: "Black Soil".to_string(),
                location: "Belagavi".to_string(),
                water_access: "Canal".to_string(),
                language: Language::En,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.field(), Some("schedule"));
    }
}
