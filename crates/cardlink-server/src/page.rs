//! Registration page served at `/`.

pub const REGISTER_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Card Registration</title>
<style>
  body { font-family: sans-serif; max-width: 28rem; margin: 3rem auto; }
  label { display: block; margin-top: 1rem; }
  input { width: 100%; padding: 0.4rem; }
  button { margin-top: 1.5rem; padding: 0.5rem 1rem; }
  #status { margin-top: 1.5rem; font-weight: bold; }
</style>
</head>
<body>
<h1>Register a card</h1>
<form id="register">
  <label>Name <input name="name" required></label>
  <label>Register Number <input name="reg_no" required></label>
  <button type="submit">Register</button>
</form>
<p id="status"></p>
<script>
const statusEl = document.getElementById("status");
const form = document.getElementById("register");

async function poll(regNo) {
  const res = await fetch("/check_status/" + encodeURIComponent(regNo));
  const body = await res.json();
  statusEl.textContent = body.message;
  if (body.status === "waiting") {
    setTimeout(() => poll(regNo), 2000);
  } else {
    form.querySelector("button").disabled = false;
  }
}

form.addEventListener("submit", async (event) => {
  event.preventDefault();
  form.querySelector("button").disabled = true;
  const res = await fetch("/register", {
    method: "POST",
    body: new URLSearchParams(new FormData(form)),
  });
  const body = await res.json();
  statusEl.textContent = body.message;
  if (body.status === "waiting") {
    poll(body.reg_no);
  } else {
    form.querySelector("button").disabled = false;
  }
});
</script>
</body>
</html>
"#;
