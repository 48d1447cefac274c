use std::fmt::Write as _;

use crate::instruction::{Instruction, Workflow};
use crate::settings::{BackgroundProcessing, ModeSettings, WorkMode};

/// Role of one image slot in the outgoing payload. The remote model has no
/// channel other than part order to tell which image plays which role, so the
/// compiled order is a hard contract: source, then mask, then exactly one of
/// reference/background, and the instruction text always last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Source,
    Mask,
    Reference,
    Background,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPrompt {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// Settings keys already consumed by a template and never echoed into the
/// generic key/value dump.
const DUMP_EXCLUDED_KEYS: [&str; 2] = ["context", "studioFinish"];

/// Compiles one edit request into the final instruction text plus the ordered
/// attachment plan. Pure and deterministic.
pub fn compile(
    settings: &ModeSettings,
    instruction: &Instruction,
    has_mask: bool,
    has_reference: bool,
    has_background: bool,
) -> CompiledPrompt {
    let mode = settings.mode();
    let mut attachments = vec![Attachment::Source];
    if mode == WorkMode::Creative && has_mask {
        attachments.push(Attachment::Mask);
    }
    if mode == WorkMode::Creative && has_reference {
        attachments.push(Attachment::Reference);
    } else if mode == WorkMode::Composite && has_background {
        attachments.push(Attachment::Background);
    }

    let text = match settings {
        ModeSettings::Portrait(portrait) => compile_portrait(portrait, instruction),
        ModeSettings::Restore(restore) => compile_restore(restore),
        ModeSettings::Creative(creative) => {
            compile_creative(creative, instruction, has_mask, has_reference)
        }
        ModeSettings::Composite(composite) => compile_composite(composite, instruction),
    };

    CompiledPrompt { text, attachments }
}

fn compile_portrait(
    settings: &crate::settings::PortraitSettings,
    instruction: &Instruction,
) -> String {
    let mut out = match instruction {
        Instruction::Workflow(Workflow::InstantRemaster) => String::from(
            "CRITICAL TASK: Perform an INSTANT STUDIO REMASTER. This is an automated one-click \
             process. Execute the following professional studio workflow with optimal settings to \
             transform the input photo into a hyper-realistic, 8K masterpiece.\n\n\
             **User's primary instruction:** \"Make this portrait look like it was shot in a \
             professional studio with high-end equipment.\"\n\n",
        ),
        _ => {
            let primary = instruction
                .as_free_text()
                .filter(|text| !text.is_empty())
                .unwrap_or("Enhance this portrait based on the parameters below.");
            format!(
                "CRITICAL TASK: Perform a custom studio-quality portrait enhancement based on the \
                 user's settings.\n\n**User's primary instruction:** \"{primary}\"\n\n"
            )
        }
    };

    let _ = write!(
        out,
        "---\n\
         **WORKFLOW & PARAMETERS:**\n\n\
         **STEP 1: CORE ENGINE - IDENTITY & DETAIL**\n\
         - **Identity-Lock: CRITICAL - 100% PRESERVATION.** The subject's facial features and \
         identity must not be altered.\n\
         - **Generative Upscale Target:** Reconstruct the image to a target resolution of \
         **{}**.\n",
        settings.target_resolution
    );
    if settings.auto_skin_texture {
        out.push_str(
            "- **Auto-Skin Texture:** ENGAGED. Generate realistic, high-frequency skin texture, \
             including pores and micro-details.\n",
        );
    }
    if settings.auto_hair_detail {
        out.push_str(
            "- **Auto-Hair Detail:** ENGAGED. Reconstruct individual, sharp strands of hair.\n",
        );
    }

    out.push_str(
        "\n**STEP 2: DYNAMIC STUDIO RELIGHTING**\n\
         - **Lighting Analysis:** First, analyze the original lighting for flaws like harsh \
         shadows or blown-out highlights.\n",
    );
    if settings.auto_balance_lighting {
        let _ = write!(
            out,
            "- **Auto-Relighting:** ENGAGED. Neutralize the original flawed lighting and re-light \
             the subject virtually using a professional **'{}'** setup. The goal is balanced, \
             dimensional light.\n\
             - **Light Intensity:** Set to approximately {}%.\n",
            settings.light_style, settings.light_intensity
        );
    } else {
        out.push_str(
            "- **Auto-Relighting:** DISENGAGED. Preserve and enhance the original lighting only.\n",
        );
    }

    out.push_str("\n**STEP 3: PROFESSIONAL LENS & CAMERA FX**\n");
    if settings.auto_bokeh {
        let _ = write!(
            out,
            "- **Depth of Field:** ENGAGED. Perform a precise subject-background separation.\n  \
             - **Lens Profile:** Simulate a **'{}'** lens to create a beautiful, creamy bokeh.\n  \
             - **Background Blur:** Set blur intensity to approximately {}%.\n",
            settings.lens_profile, settings.background_blur
        );
    } else {
        out.push_str("- **Depth of Field:** DISENGAGED. Maintain the original background focus.\n");
    }
    if settings.chromatic_aberration {
        out.push_str(
            "- **Lens Simulation:** Add subtle chromatic aberration for enhanced photorealism.\n",
        );
    }

    let _ = write!(
        out,
        "\n**STEP 4: BEAUTY & STYLE**\n\
         - **Hyper-Real Skin Finishing:**\n  \
         - **Smoothing:** Apply a natural skin smoothing effect at {}%, preserving skin texture. \
         This should NOT look like plastic.\n  \
         - **Blemish Removal:**",
        settings.skin_smoothing
    );
    let mut removals = Vec::new();
    if settings.remove_blemishes {
        removals.push("acne and spots");
    }
    if settings.remove_wrinkles {
        removals.push("wrinkles");
    }
    if settings.remove_dark_circles {
        removals.push("dark under-eye circles");
    }
    if removals.is_empty() {
        out.push_str(" No specific blemish removal requested.\n");
    } else {
        let _ = writeln!(out, " Remove {}.", removals.join(", "));
    }
    if !settings.makeup.is_empty() {
        let _ = writeln!(
            out,
            "- **Makeup Style:** Apply makeup as described: \"{}\".",
            settings.makeup
        );
    }
    if !settings.hair.is_empty() {
        let _ = writeln!(
            out,
            "- **Hair Style:** Modify hair as described: \"{}\".",
            settings.hair
        );
    }

    out.push_str(
        "\n**FINAL INSTRUCTION:** Execute this multi-step process to transform the portrait. The \
         result must be hyper-realistic, detailed, and indistinguishable from a high-end \
         professional studio photograph.",
    );
    out
}

fn compile_restore(settings: &crate::settings::RestoreSettings) -> String {
    let context = if settings.context.is_empty() {
        "No specific context provided."
    } else {
        settings.context.as_str()
    };
    let mut out = format!(
        "CRITICAL TASK: Perform a hyper-realistic, studio-quality photo restoration. The goal is \
         to make the restored photo indistinguishable from a modern, high-resolution photograph \
         of the original scene, finished with professional studio techniques. It must be a 100% \
         faithful restoration of the subject's identity.\n\n\
         **User-provided context:** \"{context}\"\n\n\
         ---\n\
         **RESTORATION WORKFLOW:**\n\n\
         **STEP 1: ANALYSIS & CLEANING**\n\
         - Analysis: You are an expert photo restoration AI. Analyze the image for all forms of \
         degradation.\n"
    );
    if settings.auto_clean {
        out.push_str(
            "- Damage & Noise Removal: ENGAGED. Automatically remove all scratches, stains, mold, \
             and film grain without losing core details. Prepare a clean base image.\n",
        );
    } else {
        out.push_str(
            "- Damage & Noise Removal: DISENGAGED. Preserve original grain and minor \
             imperfections.\n",
        );
    }

    out.push_str(
        "\n**STEP 2: CORE REMASTERING**\n\
         - Identity-Lock: CRITICAL - 100% PRESERVATION. The subject's facial features and \
         identity must not be altered.\n",
    );
    if settings.hyper_real_skin {
        out.push_str(
            "- Hyper-Real Skin Texture: ENGAGED. Generate realistic skin texture, including pores \
             and micro-details, appropriate for the subject's age.\n",
        );
    }
    if settings.hair_and_fabric_details {
        out.push_str(
            "- Hair & Fabric Detail Generation: ENGAGED. Reconstruct individual strands of hair \
             and the fine texture of clothing fabric for maximum realism.\n",
        );
    }
    let _ = writeln!(
        out,
        "- Target Resolution: Upscale the final output to {}.",
        settings.resolution
    );

    out.push_str("\n**STEP 3: STUDIO FINISHING**\n");
    if settings.auto_studio_light {
        let _ = writeln!(
            out,
            "- Studio Relighting: ENGAGED. Remove the original, often flat or poor, lighting. \
             Re-light the subject using a virtual '{}' setup to create depth, dimension, and a \
             professional look.",
            settings.light_style
        );
    } else {
        out.push_str(
            "- Studio Relighting: PRESERVE ORIGINAL LIGHTING. Only enhance, do not replace, the \
             original lighting.\n",
        );
    }
    if settings.modern_auto_color {
        out.push_str(
            "- Modern Colorization: ENGAGED. Apply vibrant, realistic colors as if shot with a \
             modern digital camera.\n",
        );
    }
    if settings.auto_white_balance {
        out.push_str(
            "- Auto White Balance: ENGAGED. Correct any color casts to ensure neutral tones and \
             accurate skin colors.\n",
        );
    }
    match settings.background_processing {
        BackgroundProcessing::Remaster => out.push_str(
            "- Background Processing: Remaster the original background. Enhance its details and \
             match its lighting and color to the relit subject.\n",
        ),
        BackgroundProcessing::NewStudio => {
            let _ = writeln!(
                out,
                "- Background Processing: Replace the original background with a new, clean \
                 studio backdrop.\n  \
                 - Backdrop Style: Create a '{}' backdrop that complements the subject.",
                settings.studio_backdrop
            );
        }
    }

    out.push_str(
        "\n**FINAL INSTRUCTION:** Execute this multi-step process to transform the old photograph \
         into a perfect, modern, studio-quality portrait. The result must be hyper-realistic and \
         seamless.",
    );
    out
}

fn compile_creative(
    settings: &crate::settings::CreativeSettings,
    instruction: &Instruction,
    has_mask: bool,
    has_reference: bool,
) -> String {
    // The protection clause always leads; workflow bodies follow it.
    let mut out = String::new();
    if has_mask {
        out.push_str(
            "CRITICAL TASK: INPAINTING/OUTPAINTING WITH A PROTECTED MASK. A second image is \
             provided which acts as a mask. The WHITE areas on this mask are PROTECTED and MUST \
             NOT BE ALTERED in any way. The BLACK areas are where new content should be \
             generated.\n\n\
             **ABSOLUTE RULE: Preserve the white masked areas of the original image with 100% \
             fidelity.**\n\n\
             ---\n",
        );
    }

    match instruction {
        Instruction::Workflow(Workflow::StudioSwap) => {
            let _ = write!(
                out,
                "CRITICAL TASK: Perform a HYPER-REAL STUDIO SWAP. This involves two main stages: \
                 generative matting for perfect subject isolation, followed by a seamless \
                 composite into a new background.\n\n\
                 **User's primary instruction:** \"Replace the background of the image with a new \
                 one based on the following prompt, ensuring the result is indistinguishable from \
                 a real studio photograph.\"\n\n\
                 ---\n\
                 **WORKFLOW & PARAMETERS:**\n\n\
                 **STAGE 1: HYPER-DETAIL GENERATIVE MATTING**\n\
                 - **Action:** Isolate the primary subject from the original background.\n\
                 - **Method: CRITICAL - Use Generative Matting.** Do NOT use a simple alpha mask. \
                 Instead, analyze the boundary pixels (especially hair, fur, transparent fabrics) \
                 and intelligently REGENERATE them. The goal is to preserve 100% of fine details \
                 like individual hair strands, avoiding any 'halo' or matted-edge effects. The \
                 isolated subject must be perfectly clean.\n\n\
                 **STAGE 2: HYPER-REAL COMPOSITING**\n\
                 - **New Background Prompt:** \"{}\"\n\
                 - **Action:** Composite the perfectly isolated subject into the newly generated \
                 background.\n\
                 - **Compositing Method: CRITICAL - Use Hyper-Real Logic.** This is NOT a simple \
                 layering. Execute the following in order:\n  \
                 - **1. Environment Lighting Analysis:** Scan the new background to create a \
                 virtual high-dynamic-range imaging (HDRI) map. Identify all light sources, their \
                 direction, color temperature, and intensity (e.g., 'large softbox from \
                 top-right, warm key light').\n  \
                 - **2. Subject Re-lighting:** COMPLETELY REMOVE the original lighting from the \
                 isolated subject. Then, use the virtual HDRI map to cast new, physically \
                 accurate light onto the subject. The subject's lighting, highlights, and shadows \
                 MUST match the new environment perfectly.\n  \
                 - **3. Smart Shadow Casting:** Generate and cast a realistic shadow from the \
                 subject onto the new background, based on the identified light sources. The \
                 shadow should be soft or hard as dictated by the lighting.\n  \
                 - **4. Full Harmonization:** Automatically match the subject's color \
                 temperature, black levels, white balance, saturation, and film grain to the new \
                 background.\n  \
                 - **5. Seam Blending:** Ensure the final integration is absolutely invisible.\n\n\
                 **FINAL INSTRUCTION:** The final image must look like a single, cohesive \
                 photograph taken in a professional setting. The composite should be completely \
                 undetectable.",
                settings.background_prompt
            );
        }
        Instruction::Workflow(Workflow::FullBody) => {
            let _ = write!(
                out,
                "CRITICAL TASK: Perform an 8K FULL-BODY GENERATION. This involves logically \
                 extending the canvas and generating the missing parts of a character with \
                 hyper-realistic detail.\n\n\
                 **User's primary instruction:** \"Extend the character in the image based on the \
                 following description. The result must be a complete, high-resolution \
                 portrait.\"\n\n\
                 ---\n\
                 **WORKFLOW & PARAMETERS:**\n\n\
                 **STAGE 1: CORE IDENTITY PRESERVATION**\n\
                 - **Identity-Lock: CRITICAL - 100% ENGAGED.** The subject's face, identity, and \
                 all existing visible features MUST be preserved without any alteration.\n\n\
                 **STAGE 2: 8K GENERATIVE EXTENSION**\n\
                 - **Character Generation Prompt:** \"{prompt}\"\n\
                 - **Action:** Generate the missing parts of the character (body, clothing, pose) \
                 based on the user's prompt.\n\
                 - **Generation Engine: CRITICAL - Use 8K Generative Engine.** The newly created \
                 parts must not be a simple, low-detail fill. They must be rendered with \
                 extremely high-frequency details.\n  \
                 - **Fabric Texture:** Generate realistic micro-textures for clothing (e.g., \
                 weave of a suit, knit of a sweater).\n  \
                 - **Skin Detail:** If any new skin is visible, it must have realistic texture.\n  \
                 - **Creases & Folds:** Clothing should have natural, physically-correct folds \
                 and creases.\n\
                 - **Lighting Synchronization:** The lighting on the newly generated parts (e.g., \
                 the new suit) MUST perfectly and seamlessly match the existing lighting on the \
                 original parts of the subject (e.g., the face). Analyze the original lighting \
                 and apply it consistently across the entire figure.\n",
                prompt = settings.full_body_prompt
            );
            if has_reference {
                let _ = write!(
                    out,
                    "\n**STAGE 2.5: REFERENCE IMAGE INTEGRATION**\n\
                     - **Action:** A third image has been provided as a reference. Intelligently \
                     incorporate elements from this reference image into the generated parts of \
                     the character. This could be clothing, an object, or even another person to \
                     include. The integration must be seamless and contextually appropriate based \
                     on the user's prompt (\"{prompt}\"). The reference image is a guide, not a \
                     strict composite element.\n",
                    prompt = settings.full_body_prompt
                );
            }
            out.push_str(
                "\n**FINAL INSTRUCTION:** The output should be a single, cohesive, full-body \
                 portrait where the generated parts are indistinguishable in quality and detail \
                 from the original photograph. The entire subject should look sharp, clear, and \
                 rendered in 8K resolution.",
            );
        }
        Instruction::Workflow(Workflow::InstantRemaster) | Instruction::FreeText(_) => {
            let primary = instruction.as_free_text().unwrap_or_default();
            let _ = write!(
                out,
                "This is a general creative request. Use the user's primary instruction \
                 (\"{primary}\") as the main guide and creatively interpret the best outcome."
            );
        }
    }

    out
}

fn compile_composite(
    settings: &crate::settings::CompositeSettings,
    instruction: &Instruction,
) -> String {
    let primary = instruction
        .as_free_text()
        .filter(|text| !text.is_empty())
        .unwrap_or("Perform the edit based on the parameters below.");
    let mut out = format!(
        "Task: Perform an image editing operation based on the user's request.\n\
         Mode: \"{}\"\n\n\
         User's primary instruction: \"{primary}\"\n\n\
         Apply the following style and technical parameters:\n",
        WorkMode::Composite.as_str()
    );

    for (key, value) in &settings.values {
        if value.is_null() {
            continue;
        }
        if value.as_str().is_some_and(str::is_empty) {
            continue;
        }
        if DUMP_EXCLUDED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let _ = writeln!(out, "- {key}: {value}");
    }

    let _ = write!(
        out,
        "\nInstructions for Composite Mode:\n\
         - The first image provided is the SUBJECT.\n\
         - The second image provided is the new BACKGROUND.\n\
         - Seamlessly integrate the subject into the background.\n\
         - Pay close attention to matching lighting, color temperature, shadows, grain, focus, \
         and perspective to create a photorealistic composite.\n\
         - The user's prompt (\"{primary}\") provides additional context for the final scene."
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{
        CompositeSettings, CreativeSettings, PortraitSettings, RestoreSettings,
    };

    fn creative(background_prompt: &str, full_body_prompt: &str) -> ModeSettings {
        ModeSettings::Creative(CreativeSettings {
            background_prompt: background_prompt.into(),
            full_body_prompt: full_body_prompt.into(),
        })
    }

    #[test]
    fn studio_swap_expands_workflow_without_echoing_sentinel() {
        let compiled = compile(
            &creative("a beach", ""),
            &Instruction::parse("STUDIO_SWAP"),
            false,
            false,
            false,
        );
        assert!(compiled.text.contains("GENERATIVE MATTING"));
        assert!(compiled.text.contains("Subject Re-lighting"));
        assert!(compiled.text.contains("Smart Shadow Casting"));
        assert!(compiled.text.contains("Full Harmonization"));
        assert!(compiled.text.contains("\"a beach\""));
        assert!(!compiled.text.contains("STUDIO_SWAP"));
        assert_eq!(compiled.attachments, vec![Attachment::Source]);
    }

    #[test]
    fn mask_clause_leads_the_compiled_text() {
        let compiled = compile(
            &creative("a forest", ""),
            &Instruction::Workflow(Workflow::StudioSwap),
            true,
            false,
            false,
        );
        assert!(compiled.text.starts_with("CRITICAL TASK: INPAINTING/OUTPAINTING"));
        assert!(compiled.text.contains("HYPER-REAL STUDIO SWAP"));
        assert_eq!(
            compiled.attachments,
            vec![Attachment::Source, Attachment::Mask]
        );
    }

    #[test]
    fn full_body_reference_clause_is_appended_not_substituted() {
        let settings = creative("", "a navy three-piece suit");
        let without = compile(
            &settings,
            &Instruction::Workflow(Workflow::FullBody),
            false,
            false,
            false,
        );
        let with = compile(
            &settings,
            &Instruction::Workflow(Workflow::FullBody),
            false,
            true,
            false,
        );
        assert!(!without.text.contains("REFERENCE IMAGE INTEGRATION"));
        assert!(with.text.contains("REFERENCE IMAGE INTEGRATION"));
        // The base workflow body survives the append.
        assert!(with.text.contains("8K GENERATIVE EXTENSION"));
        assert_eq!(
            with.attachments,
            vec![Attachment::Source, Attachment::Reference]
        );
    }

    #[test]
    fn composite_dump_drops_empty_null_and_excluded_keys() {
        let mut values = std::collections::BTreeMap::new();
        values.insert("filmGrain".to_owned(), serde_json::json!(35));
        values.insert("vignette".to_owned(), serde_json::json!(""));
        values.insert("toneCurve".to_owned(), serde_json::Value::Null);
        values.insert("context".to_owned(), serde_json::json!("already consumed"));
        let compiled = compile(
            &ModeSettings::Composite(CompositeSettings { values }),
            &Instruction::FreeText("sunset rooftop".into()),
            false,
            false,
            true,
        );
        assert!(compiled.text.contains("- filmGrain: 35"));
        assert!(!compiled.text.contains("vignette"));
        assert!(!compiled.text.contains("toneCurve"));
        assert!(!compiled.text.contains("already consumed"));
        assert!(compiled.text.contains("\"sunset rooftop\""));
        assert_eq!(
            compiled.attachments,
            vec![Attachment::Source, Attachment::Background]
        );
    }

    #[test]
    fn portrait_instant_remaster_uses_fixed_template() {
        let compiled = compile(
            &ModeSettings::Portrait(PortraitSettings::default()),
            &Instruction::parse("INSTANT_STUDIO_REMASTER"),
            false,
            false,
            false,
        );
        assert!(compiled.text.contains("INSTANT STUDIO REMASTER"));
        assert!(!compiled.text.contains("INSTANT_STUDIO_REMASTER"));
        assert!(compiled.text.contains("Identity-Lock"));
        assert!(compiled.text.contains("**8K**"));
        assert!(compiled.text.contains("'3-point'"));
    }

    #[test]
    fn portrait_free_text_lands_as_primary_instruction() {
        let compiled = compile(
            &ModeSettings::Portrait(PortraitSettings::default()),
            &Instruction::FreeText("soften the lighting".into()),
            false,
            false,
            false,
        );
        assert!(compiled.text.contains("\"soften the lighting\""));
    }

    #[test]
    fn portrait_skips_disengaged_clauses() {
        let settings = PortraitSettings {
            auto_balance_lighting: false,
            auto_bokeh: false,
            remove_blemishes: false,
            remove_wrinkles: false,
            remove_dark_circles: false,
            ..PortraitSettings::default()
        };
        let compiled = compile(
            &ModeSettings::Portrait(settings),
            &Instruction::FreeText(String::new()),
            false,
            false,
            false,
        );
        assert!(compiled.text.contains("**Auto-Relighting:** DISENGAGED"));
        assert!(compiled.text.contains("**Depth of Field:** DISENGAGED"));
        assert!(compiled.text.contains("No specific blemish removal requested."));
    }

    #[test]
    fn restore_new_studio_backdrop_clause() {
        let settings = RestoreSettings {
            background_processing: BackgroundProcessing::NewStudio,
            studio_backdrop: "charcoal".into(),
            context: "wedding photo from 1962".into(),
            ..RestoreSettings::default()
        };
        let compiled = compile(
            &ModeSettings::Restore(settings),
            &Instruction::FreeText(String::new()),
            false,
            false,
            false,
        );
        assert!(compiled.text.contains("Replace the original background"));
        assert!(compiled.text.contains("'charcoal' backdrop"));
        assert!(compiled.text.contains("wedding photo from 1962"));
    }

    #[test]
    fn mask_and_reference_only_attach_in_creative_mode() {
        let compiled = compile(
            &ModeSettings::Portrait(PortraitSettings::default()),
            &Instruction::FreeText(String::new()),
            true,
            true,
            true,
        );
        assert_eq!(compiled.attachments, vec![Attachment::Source]);
    }
}
