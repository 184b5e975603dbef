use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ItemFn, Pat, Type, parse_macro_input};

/// Derive a `StaticTag` implementation from a function.
///
/// Two parameter names are reserved and receive engine values:
///
/// - `ctx`: receives `&TagContext` (the tag and its resolved body)
/// - `rec`: receives `&Record` (the static or per-render record)
///
/// Every other parameter is read from the record field of the same name,
/// with automatic type validation.
///
/// # Attribute syntax
///
/// ```ignore
/// #[static_tag(name = "site")]
/// ```
///
/// # Supported parameter types (for record fields)
/// - `Value`: accepts any value, missing fields become `Value::None`
/// - `String`: validates the field is a string, passes the inner String
/// - `f64`: validates the field is a number, passes the inner f64
/// - `bool`: validates the field is a bool, passes the inner bool
/// - `Vec<Value>`: validates the field is an array, passes the inner Vec
///
/// # Example
/// ```ignore
/// #[static_tag(name = "link")]
/// fn link(base_url: String, ctx: &TagContext) -> Result<Value, EvalError> {
///     Ok(Value::String(format!("{base_url}/{}", ctx.text)))
/// }
/// // registers as: tags.register_static(LinkTag);
/// ```
#[proc_macro_attribute]
pub fn static_tag(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TagArgs);
    let input_fn = parse_macro_input!(item as ItemFn);

    let fn_name = &input_fn.sig.ident;
    let struct_name = format_ident!("{}Tag", to_pascal_case(&fn_name.to_string()));
    let tag_name = &args.name;
    let params = match collect_params(&input_fn, false) {
        Ok(params) => params,
        Err(e) => return e.to_compile_error().into(),
    };

    let Params {
        extractions,
        names,
        types,
        call_args,
    } = params;
    let fn_body = &input_fn.block;

    let output = quote! {
        pub struct #struct_name;

        impl #struct_name {
            fn execute(#(#names: #types),*) -> Result<kurly::Value, kurly::EvalError> {
                #fn_body
            }
        }

        impl kurly::registry::StaticTag for #struct_name {
            fn render(
                &self,
                ctx: &kurly::TagContext,
                rec: &kurly::Record,
            ) -> Result<kurly::Value, kurly::EvalError> {
                let _ = (&ctx, &rec);
                #(#extractions)*
                Self::execute(#(#call_args),*)
            }

            fn signature(&self) -> kurly::registry::TagSignature {
                kurly::registry::TagSignature::new(#tag_name)
            }
        }
    };

    output.into()
}

/// Derive a `DynamicTag` implementation from a function.
///
/// The function runs on every render. Reserved parameter names:
///
/// - `ctx`: receives `&TagContext`
/// - `rec`: receives `&Record` (the per-render record)
/// - `children`: receives `Vec<Value>`, the rendered body of the tag
///
/// All other parameters are read from the record by name, with the same
/// type validation as [`macro@static_tag`].
///
/// # Examples
///
/// Wrapping the body:
/// ```ignore
/// #[dynamic_tag(name = "bold")]
/// fn bold(children: Vec<Value>) -> Result<Value, EvalError> {
///     let mut out = vec![Value::from("<b>")];
///     out.extend(children);
///     out.push(Value::from("</b>"));
///     Ok(Value::Array(out))
/// }
/// ```
///
/// Reading the record:
/// ```ignore
/// #[dynamic_tag(name = "greet")]
/// fn greet(greeting: String, ctx: &TagContext) -> Result<Value, EvalError> {
///     Ok(Value::String(format!("{greeting} {}", ctx.text)))
/// }
/// ```
#[proc_macro_attribute]
pub fn dynamic_tag(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TagArgs);
    let input_fn = parse_macro_input!(item as ItemFn);

    let fn_name = &input_fn.sig.ident;
    let struct_name = format_ident!("{}Tag", to_pascal_case(&fn_name.to_string()));
    let tag_name = &args.name;
    let params = match collect_params(&input_fn, true) {
        Ok(params) => params,
        Err(e) => return e.to_compile_error().into(),
    };

    let Params {
        extractions,
        names,
        types,
        call_args,
    } = params;
    let fn_body = &input_fn.block;

    let output = quote! {
        pub struct #struct_name;

        impl #struct_name {
            fn execute(#(#names: #types),*) -> Result<kurly::Value, kurly::EvalError> {
                #fn_body
            }
        }

        impl kurly::registry::DynamicTag for #struct_name {
            fn bind(
                &self,
                ctx: &std::sync::Arc<kurly::TagContext>,
            ) -> Result<kurly::RenderFn, kurly::EvalError> {
                let ctx = std::sync::Arc::clone(ctx);
                Ok(kurly::render_fn(move |rec: &kurly::Record, children: Vec<kurly::Value>| {
                    let ctx: &kurly::TagContext = &ctx;
                    let _ = (&ctx, &rec, &children);
                    #(#extractions)*
                    #struct_name::execute(#(#call_args),*)
                }))
            }

            fn signature(&self) -> kurly::registry::TagSignature {
                kurly::registry::TagSignature::new(#tag_name)
            }
        }
    };

    output.into()
}

struct Params {
    extractions: Vec<proc_macro2::TokenStream>,
    names: Vec<syn::Ident>,
    types: Vec<proc_macro2::TokenStream>,
    call_args: Vec<proc_macro2::TokenStream>,
}

/// Sort function parameters into reserved engine values and record fields.
fn collect_params(input_fn: &ItemFn, allow_children: bool) -> syn::Result<Params> {
    let mut params = Params {
        extractions: Vec::new(),
        names: Vec::new(),
        types: Vec::new(),
        call_args: Vec::new(),
    };

    for fn_arg in &input_fn.sig.inputs {
        let FnArg::Typed(pat_type) = fn_arg else {
            return Err(syn::Error::new_spanned(fn_arg, "tag handlers cannot take `self`"));
        };
        let Pat::Ident(ident) = &*pat_type.pat else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "tag handler parameters must be plain identifiers",
            ));
        };
        let param_name = &ident.ident;
        let param_name_str = param_name.to_string();

        match param_name_str.as_str() {
            "ctx" => {
                params.types.push(quote! { &kurly::TagContext });
                params.call_args.push(quote! { ctx });
            }
            "rec" => {
                params.types.push(quote! { &kurly::Record });
                params.call_args.push(quote! { rec });
            }
            "children" if allow_children => {
                params.types.push(quote! { Vec<kurly::Value> });
                params.call_args.push(quote! { children });
            }
            _ => {
                let (extraction, rust_type) = generate_extraction(&param_name_str, &pat_type.ty)?;
                params.extractions.push(extraction);
                params.types.push(rust_type);
                params.call_args.push(quote! { #param_name });
            }
        }
        params.names.push(param_name.clone());
    }

    Ok(params)
}

/// Generate code reading a record field into a typed local.
///
/// Returns (extraction_code, rust_type_token), or an error spanning the type
/// when it is not one of the supported field types.
fn generate_extraction(
    name: &str,
    ty: &Type,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let ident = format_ident!("{}", name);
    let type_str = quote!(#ty).to_string().replace(' ', "");

    let typed = |variant: proc_macro2::TokenStream,
                 binding: proc_macro2::TokenStream,
                 expected: &str,
                 rust_type: proc_macro2::TokenStream| {
        (
            quote! {
                let #ident = match rec.get(#name) {
                    Some(kurly::Value::#variant) => #binding,
                    Some(other) => return Err(kurly::EvalError::type_error(#name, #expected, other.type_name())),
                    None => return Err(kurly::EvalError::missing_field(#name)),
                };
            },
            rust_type,
        )
    };

    let extraction = match type_str.as_str() {
        "String" => typed(quote! { String(s) }, quote! { s.clone() }, "string", quote! { String }),
        "f64" => typed(quote! { Number(n) }, quote! { *n }, "number", quote! { f64 }),
        "bool" => typed(quote! { Bool(b) }, quote! { *b }, "bool", quote! { bool }),
        "Vec<Value>" | "Vec<kurly::Value>" => typed(
            quote! { Array(items) },
            quote! { items.clone() },
            "array",
            quote! { Vec<kurly::Value> },
        ),
        "Value" | "kurly::Value" => (
            quote! {
                let #ident = rec.get(#name).cloned().unwrap_or(kurly::Value::None);
            },
            quote! { kurly::Value },
        ),
        _ => {
            return Err(syn::Error::new_spanned(
                ty,
                "unsupported parameter type: expected String, f64, bool, Vec<Value> or Value",
            ));
        }
    };
    Ok(extraction)
}

fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

// -- Attribute arg parsing -----------------------------------------------

struct TagArgs {
    name: String,
}

impl syn::parse::Parse for TagArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let ident: syn::Ident = input.parse()?;
        if ident != "name" {
            return Err(syn::Error::new(ident.span(), "expected `name`"));
        }
        input.parse::<syn::Token![=]>()?;
        let lit: syn::LitStr = input.parse()?;
        Ok(TagArgs { name: lit.value() })
    }
}
