use serde_json::{Value, json};

/// Greeting seeded into every new chat transcript.
pub const CHAT_GREETING: &str = "Hello! How can I help you today? Ask me about medications, conditions, or general health topics.";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful and knowledgeable medical AI assistant. Your purpose is to provide clear, accurate, and easy-to-understand information about medical topics, drugs, and health conditions using the most up-to-date information available. You are not a doctor and you must always remind the user to consult a healthcare professional for medical advice. Do not provide diagnoses or treatment plans.";

/// Sample prescription offered by the demo surfaces.
pub const SAMPLE_PRESCRIPTION: &str = "Patient Name: John Doe, Age: 72\nRx:\n1. Metformin 1000mg, take one tablet twice daily.\n2. Lisinopril 40mg, take one tablet daily.\n3. Warfarin 5mg, take one tablet daily.";

pub fn analysis_prompt(prescription: &str) -> String {
    format!(
        r#"You are an advanced AI medical assistant. A user has provided medical prescription text. Your task is to perform a detailed analysis and generate a JSON object based on the provided schema.

The analysis must include:
1.  **NLP-Based Drug Information Extraction:** For each drug, extract its name, dosage, and frequency.
2.  **Dosage Verification:** Based on the patient's age and the drug details, verify if the dosage is correct. Provide a status ('Correct', 'Warning', 'Incorrect') and a recommendation. For example, if the age is very young or old, the dosage might need adjustment.
3.  **Alternative Medication Suggestions:** Provide a list of safe alternative medication options for each drug.
4.  **Interaction Check:** Identify and describe any potential drug-drug interactions.

The input text is: "{prescription}".
Respond ONLY with the valid JSON object matching the provided schema."#
    )
}

pub fn interaction_prompt(drug_list: &str) -> String {
    format!(
        r#"You are an expert pharmacologist AI. Analyze the following list of drugs for potential interactions using up-to-date information. The list is: "{drug_list}".

Identify all potential drug-drug interactions. For each interaction, provide the names of the interacting drugs, the severity level (High, Moderate, or Low), and a clear, concise description of the interaction and clinical advice.

If no interactions are found, return an empty array.

Respond ONLY with a valid JSON array matching this structure: [{{ "drugs": ["drug1", "drug2"], "severity": "High|Moderate|Low", "description": "..." }}]. Do not include any other text or markdown formatting."#
    )
}

/// Response schema for [`crate::models::AnalysisResult`], in the Gemini
/// OpenAPI-subset dialect.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {
                "type": "STRING",
                "description": "A high-level summary of the prescription analysis."
            },
            "interactions": {
                "type": "ARRAY",
                "description": "A list of potential drug-drug interactions found in the prescription.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "drugs": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "The drugs involved in the interaction."
                        },
                        "severity": {
                            "type": "STRING",
                            "description": "The severity of the interaction (e.g., 'High', 'Moderate', 'Low')."
                        },
                        "description": {
                            "type": "STRING",
                            "description": "A description of the potential interaction."
                        }
                    },
                    "required": ["drugs", "severity", "description"]
                }
            },
            "medications": {
                "type": "ARRAY",
                "description": "A detailed analysis of each medication found in the prescription text.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING", "description": "The extracted name of the drug." },
                        "dosage": { "type": "STRING", "description": "The extracted dosage information (e.g., '500mg')." },
                        "frequency": { "type": "STRING", "description": "The extracted frequency of administration (e.g., 'twice daily')." },
                        "dosageAnalysis": {
                            "type": "OBJECT",
                            "properties": {
                                "status": {
                                    "type": "STRING",
                                    "enum": ["Correct", "Warning", "Incorrect"],
                                    "description": "The status of the dosage verification ('Correct', 'Warning', 'Incorrect')."
                                },
                                "recommendation": {
                                    "type": "STRING",
                                    "description": "A detailed recommendation or note regarding the dosage, especially if not 'Correct'."
                                }
                            },
                            "required": ["status", "recommendation"]
                        },
                        "alternatives": {
                            "type": "ARRAY",
                            "description": "A list of suggested safer alternative medications.",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["name", "dosage", "frequency", "dosageAnalysis", "alternatives"]
                }
            }
        },
        "required": ["summary", "interactions", "medications"]
    })
}
