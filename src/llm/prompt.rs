/// Instruction sent alongside the exported dashboard PDF.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert performance analyst for a field-service engineering team
that installs and maintains industrial weighing equipment.

Analyse the attached engineer performance dashboard PDF and extract the following data
in STRICT JSON format. Do not include any text outside the JSON block.

Required JSON structure:
{
  "engineer_name": "string",
  "week_range": "string (e.g. 08-14 Feb 2026)",
  "working_hours": {
    "score": number,
    "max_score": 20,
    "days": [
      {
        "day": "Monday|Tuesday|Wednesday|Thursday|Friday|Saturday",
        "hours": "HH:MM",
        "check_in": "HH:MM",
        "check_out": "HH:MM",
        "status": "present|absent|exceptional"
      }
    ],
    "week1_score": number | null
  },
  "form_quality": {
    "score": number,
    "max_score": 20,
    "examples": [
      {
        "company": "string",
        "machine_no": "string",
        "work_type": "string",
        "problem": "string",
        "work_done": "string",
        "quality_assessment": "good|average|poor|critical"
      }
    ],
    "week1_score": number | null
  },
  "feedback": {
    "score": number,
    "max_score": 30,
    "applicable": true|false,
    "ratings": [
      {
        "company": "string",
        "machine_no": "string",
        "rating": number,
        "out_of": 10,
        "date": "string",
        "comment": "string"
      }
    ],
    "week1_score": number | null
  },
  "repeat_calls": {
    "score": number,
    "max_score": 30,
    "count": number,
    "calls": [
      {
        "company": "string",
        "machine_no": "string",
        "first_visit": "string",
        "repeat_date": "string",
        "issue_type": "string"
      }
    ],
    "week1_score": number | null
  },
  "total_score": number,
  "max_possible": number,
  "percentage": number,
  "week1_total": number | null,
  "week1_max": number,
  "strengths": ["string"],
  "weaknesses": ["string"],
  "immediate_actions": ["string"]
}

Notes:
- If feedback data is absent or zero, set applicable=false and max_possible=70
- Scores are out of 70 when feedback is not applicable
- percentage = total_score / max_possible * 100
- Extract ALL form examples even if poorly written
- Scores are whole numbers and never exceed their max_score
- Use null for previous-week values that are not in the PDF
"#;
