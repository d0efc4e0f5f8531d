//! Shared fixtures for the integration suites

#![allow(dead_code)]

use fmea_common::model::LegacyDocument;
use serde_json::json;

/// One process step, one work element, one FM linked to one FE (S9) and one FC
pub fn brake_caliper() -> LegacyDocument {
    serde_json::from_value(json!({
        "l1": {
            "id": "L1-1",
            "name": "Brake Caliper",
            "types": [{
                "id": "T-USER",
                "name": "User",
                "functions": [{
                    "id": "F-1",
                    "name": "Stop vehicle",
                    "requirements": [{ "id": "REQ-1", "name": "Clamp force" }]
                }]
            }],
            "failureScopes": [{
                "id": "FE-1",
                "reqId": "REQ-1",
                "requirement": "Clamp force",
                "scope": "User",
                "effect": "Stop Function Loss",
                "severity": 9
            }]
        },
        "l2": [{
            "id": "P-1",
            "no": "10",
            "name": "Machining",
            "order": 1,
            "functions": [{
                "id": "PF-1",
                "name": "Machine bore",
                "productChars": [{ "id": "PC-1", "name": "Bore diameter" }]
            }],
            "l3": [{
                "id": "WE-1",
                "m4": "MC",
                "name": "CNC Lathe",
                "order": 1,
                "functions": [{
                    "id": "WF-1",
                    "name": "Cut bore",
                    "processChars": [{ "id": "PR-1", "name": "Spindle speed" }]
                }]
            }],
            "failureModes": [{ "id": "FM-1", "name": "Crack", "productCharId": "PC-1" }],
            "failureCauses": [{
                "id": "FC-1",
                "name": "Tool Wear",
                "processCharId": "PR-1",
                "occurrence": 4
            }]
        }],
        "failureLinks": [{ "id": "LK-1", "fmId": "FM-1", "feId": "FE-1", "fcId": "FC-1" }],
        "risks": [{
            "id": "RA-1",
            "linkId": "LK-1",
            "severity": 9,
            "occurrence": 4,
            "detection": 7,
            "preventionControl": "Tool life counter",
            "detectionControl": "Bore gauge 100%",
            "optimization": {
                "id": "OP-1",
                "recommendedAction": "Add in-process probing",
                "responsible": "ME",
                "newDetection": 3
            }
        }],
        "project": { "projectName": "Caliper line 2", "customer": "OEM" },
        "team": [{ "name": "Kim", "role": "Lead" }]
    }))
    .expect("fixture parses")
}

/// Top-level name plus one named process step: score 70, no leaves
pub fn named_shell() -> LegacyDocument {
    serde_json::from_value(json!({
        "l1": { "id": "L1-1", "name": "Brake Caliper" },
        "l2": [{ "id": "P-1", "no": "10", "name": "Machining" }]
    }))
    .expect("fixture parses")
}
