use serde_json::{json, Value};

// Synthetic repository: textures, materials using them, prefabs referencing
// materials from a few nodes each, and one build scene using every other prefab.
pub fn synthetic_manifest(prefabs: usize) -> String {
    let textures = prefabs.max(1);
    let materials = (prefabs / 2).max(1);
    let mut assets: Vec<Value> = Vec::new();
    let mut handle = 0u64;
    let mut next = || {
        handle += 1;
        handle
    };
    let mut tex_handles = Vec::new();
    for i in 0..textures {
        let h = next();
        tex_handles.push(h);
        assets.push(json!({
            "path": format!("Assets/Textures/T{i}.png"),
            "main": {"handle": h, "name": format!("T{i}"), "type": "Texture2D",
                     "data": {"kind": "texture", "width": 256, "height": 256}}
        }));
    }
    let mut mat_handles = Vec::new();
    for i in 0..materials {
        let h = next();
        mat_handles.push(h);
        assets.push(json!({
            "path": format!("Assets/Materials/M{i}.mat"),
            "main": {"handle": h, "name": format!("M{i}"), "type": "Material",
                     "data": {"kind": "material", "shader": "Standard"}},
            "dependencies": [
                format!("Assets/Textures/T{}.png", (2 * i) % textures),
                format!("Assets/Textures/T{}.png", (2 * i + 1) % textures)
            ]
        }));
    }
    let mut scene_deps = Vec::new();
    for i in 0..prefabs {
        let h = next();
        let nodes: Vec<Value> = (0..8)
            .map(|n| {
                let m = (i + n) % materials;
                let mut node = json!({
                    "name": format!("N{n}"),
                    "components": [{"type_name": "Holder", "fields": [
                        {"property_path": "m_Material", "value": {"type": "object_reference", "value": mat_handles[m]}},
                        {"property_path": "m_Icon", "value": {"type": "object_reference", "value": tex_handles[(i + n) % textures]}}
                    ]}]
                });
                if n > 0 {
                    node["parent"] = json!((n - 1) / 2);
                }
                node
            })
            .collect();
        let path = format!("Assets/Prefabs/P{i}.prefab");
        if i % 2 == 0 {
            scene_deps.push(path.clone());
        }
        assets.push(json!({
            "path": path,
            "main": {"handle": h, "name": format!("P{i}"), "type": "GameObject",
                     "data": {"kind": "hierarchy", "nodes": nodes}},
            "dependencies": [format!("Assets/Materials/M{}.mat", i % materials)]
        }));
    }
    assets.push(json!({
        "path": "Assets/Scenes/Main.unity",
        "main": {"handle": next(), "name": "Main", "type": "SceneAsset"},
        "dependencies": scene_deps
    }));
    json!({"assets": assets, "build_scenes": [{"path": "Assets/Scenes/Main.unity"}]}).to_string()
}
